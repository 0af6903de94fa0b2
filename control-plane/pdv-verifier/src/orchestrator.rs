use std::io::Write;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::VerifyError;
use crate::config::{TargetConfig, VerifierConfig};
use crate::credential::resolve_credential;
use crate::deployment::{Deployment, proxy_service_name, token_secret_name};
use crate::endpoint::{ServiceEndpoint, resolve_endpoint};
use crate::progress::ProgressTracker;
use crate::readiness::{ReadinessGate, ReadinessOptions, wait_until_ready};
use crate::report::{emit, write_result};
use crate::validation::{
    PollPolicy, ValidationResult, ValidationService, await_completion,
};

/// Per-run knobs, usually taken from [`VerifierConfig`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub target: TargetConfig,
    pub gate: ReadinessGate,
    pub readiness: ReadinessOptions,
    pub poll: PollPolicy,
}

impl RunSettings {
    pub fn from_config(cfg: &VerifierConfig) -> Self {
        Self {
            target: cfg.target.clone(),
            gate: cfg.readiness.gate(),
            readiness: ReadinessOptions {
                timeout: cfg.readiness.timeout(),
                interval: cfg.readiness.interval(),
                allow_empty: cfg.readiness.allow_empty,
            },
            poll: PollPolicy {
                max_attempts: cfg.poll.max_attempts,
                interval: cfg.poll.interval(),
            },
        }
    }

    /// Number of progress steps a run takes.
    pub fn steps(&self) -> u64 {
        match self.gate {
            ReadinessGate::Skip => 4,
            ReadinessGate::BeforeTrigger | ReadinessGate::AfterTrigger => 5,
        }
    }
}

/// What a successful run found out.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub endpoint: ServiceEndpoint,
    pub task_id: String,
    pub result: ValidationResult,
}

pub struct Orchestrator {
    validation: Arc<dyn ValidationService>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(validation: Arc<dyn ValidationService>, settings: RunSettings) -> Self {
        Self {
            validation,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Verifies one deployed release.
    ///
    /// Steps run strictly in order and the first failure ends the run. The
    /// tracker is advanced when a step starts, so a failing step is still
    /// counted. Lines already written to `out` stay there on failure.
    #[tracing::instrument(
        skip_all,
        fields(release = %deployment.release_name(), namespace = %deployment.namespace())
    )]
    pub async fn run(
        &self,
        deployment: &dyn Deployment,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
        out: &mut (dyn Write + Send),
    ) -> Result<VerificationOutcome, VerifyError> {
        let release = deployment.release_name();
        let namespace = deployment.namespace();
        let client = deployment.cluster_client().map_err(|source| {
            VerifyError::ClusterUnavailable {
                release: release.to_string(),
                source,
            }
        })?;
        let settings = &self.settings;
        tracker.begin(settings.steps());

        if settings.gate == ReadinessGate::BeforeTrigger {
            step(tracker, "waiting for pods");
            wait_until_ready(&*client, namespace, &settings.readiness, cancel, out)
                .await?;
        }

        step(tracker, "resolving endpoint");
        let service = proxy_service_name(release, &settings.target);
        let endpoint = unless_cancelled(
            cancel,
            resolve_endpoint(&*client, namespace, &service),
            || VerifyError::ResolveCancelled {
                what: "service",
                namespace: namespace.to_string(),
                name: service.clone(),
            },
        )
        .await?;
        emit(
            out,
            format_args!("Service {service} is reachable at {}", endpoint.address),
        );

        step(tracker, "reading credential");
        let secret = token_secret_name(release, &settings.target);
        let credential = unless_cancelled(
            cancel,
            resolve_credential(
                &*client,
                namespace,
                &secret,
                &settings.target.token_secret_key,
            ),
            || VerifyError::ResolveCancelled {
                what: "secret",
                namespace: namespace.to_string(),
                name: secret.clone(),
            },
        )
        .await?;

        step(tracker, "triggering validation");
        let task_id = unless_cancelled(
            cancel,
            self.validation.trigger(&endpoint.address, &credential),
            || VerifyError::TriggerCancelled {
                address: endpoint.address.clone(),
            },
        )
        .await?;
        info!(%task_id, "validation task started");
        emit(out, format_args!("Validation task {task_id} started for {release}"));

        if settings.gate == ReadinessGate::AfterTrigger {
            step(tracker, "waiting for pods");
            wait_until_ready(&*client, namespace, &settings.readiness, cancel, out)
                .await?;
        }

        step(tracker, "waiting for results");
        emit(
            out,
            format_args!("Waiting for validation task {task_id} to finish..."),
        );
        let result =
            await_completion(&*self.validation, &task_id, &settings.poll, cancel)
                .await?;
        write_result(out, &result);

        Ok(VerificationOutcome {
            endpoint,
            task_id,
            result,
        })
    }
}

/// Drops `fut` as soon as `cancel` fires.
async fn unless_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, VerifyError>>,
    cancelled: impl FnOnce() -> VerifyError,
) -> Result<T, VerifyError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled()),
        res = fut => res,
    }
}

fn step(tracker: &ProgressTracker, name: &str) {
    tracker.set_message(name);
    tracker.advance();
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use pdv_k8s::objects::{node, pod, secret, service};
    use pdv_k8s::{ClusterClient, InMemoryCluster, K8sError};
    use secrecy::{ExposeSecret, SecretString};

    use super::*;
    use crate::ErrorKind;
    use crate::deployment::Release;
    use crate::validation::{SubTestOutcome, TaskStatus};

    #[derive(Default)]
    struct FakeValidation {
        triggers: Mutex<Vec<(String, String)>>,
        statuses: Mutex<VecDeque<TaskStatus>>,
    }

    impl FakeValidation {
        fn with_statuses(statuses: Vec<TaskStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Default::default()
            }
        }

        fn triggers(&self) -> Vec<(String, String)> {
            self.triggers.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ValidationService for FakeValidation {
        async fn trigger(
            &self,
            address: &str,
            credential: &SecretString,
        ) -> Result<String, VerifyError> {
            self.triggers.lock().unwrap().push((
                address.to_string(),
                credential.expose_secret().to_string(),
            ));
            Ok("task-1".into())
        }

        async fn query_status(&self, _task_id: &str) -> Result<TaskStatus, VerifyError> {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                return Ok(statuses.pop_front().unwrap());
            }
            Ok(statuses.front().cloned().unwrap_or(TaskStatus::Running))
        }
    }

    struct NoCluster;

    impl Deployment for NoCluster {
        fn release_name(&self) -> &str {
            "app"
        }

        fn namespace(&self) -> &str {
            "ns1"
        }

        fn cluster_client(&self) -> Result<Arc<dyn ClusterClient>, K8sError> {
            Err(K8sError::not_found("kubeconfig", "", "default"))
        }
    }

    fn settings(gate: ReadinessGate) -> RunSettings {
        RunSettings {
            target: TargetConfig {
                service_scheme: "pulsar".into(),
                service_port: 6650,
                http_scheme: "http".into(),
                proxy_service_suffix: "-proxy".into(),
                token_secret_suffix: "-token-proxy-admin".into(),
                token_secret_key: "TOKEN".into(),
            },
            gate,
            readiness: ReadinessOptions {
                timeout: Duration::from_secs(60),
                interval: Duration::from_secs(5),
                allow_empty: false,
            },
            poll: PollPolicy {
                max_attempts: 5,
                interval: Duration::from_secs(10),
            },
        }
    }

    fn cluster(pod_phase: &str) -> InMemoryCluster {
        InMemoryCluster::new()
            .with_service("ns1", service("app-proxy", "NodePort", Some("10.96.0.7")))
            .with_node(node("node-a", &[("ExternalIP", "10.0.0.5")]))
            .with_secret("ns1", secret("app-token-proxy-admin", "TOKEN", b"abc123"))
            .with_pods("ns1", vec![pod("p-0", pod_phase), pod("p-1", pod_phase)])
    }

    fn finished() -> TaskStatus {
        TaskStatus::Finished(vec![SubTestOutcome::from_raw(
            "connectivity".into(),
            "ok".into(),
        )])
    }

    #[tokio::test(start_paused = true)]
    async fn verifies_release_end_to_end() {
        let cluster = Arc::new(cluster("Running"));
        let release = Release::new("app", "ns1", cluster.clone());
        let validation =
            Arc::new(FakeValidation::with_statuses(vec![TaskStatus::Running, finished()]));
        let orchestrator = Orchestrator::new(
            validation.clone(),
            settings(ReadinessGate::BeforeTrigger),
        );
        let tracker = ProgressTracker::hidden();
        let mut out: Vec<u8> = Vec::new();

        let outcome = orchestrator
            .run(&release, &tracker, &CancellationToken::new(), &mut out)
            .await
            .unwrap();

        assert_eq!(outcome.endpoint.address, "10.0.0.5");
        assert_eq!(outcome.task_id, "task-1");
        assert_eq!(outcome.result.entries.len(), 1);
        assert!(outcome.result.all_passed());
        assert_eq!(
            validation.triggers(),
            vec![("10.0.0.5".to_string(), "abc123".to_string())]
        );

        let state = tracker.snapshot();
        assert_eq!((state.current, state.total), (5, 5));
        assert!(!state.active);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("All 2 pods in namespace ns1 are running"));
        assert!(text.contains("Sub-test: connectivity [PASS]"));
        assert!(!text.contains("abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_step_still_advances_progress() {
        let cluster = InMemoryCluster::new()
            .with_pods("ns1", vec![pod("p-0", "Running")])
            .with_secret("ns1", secret("app-token-proxy-admin", "TOKEN", b"abc123"));
        let release = Release::new("app", "ns1", Arc::new(cluster));
        let validation = Arc::new(FakeValidation::default());
        let orchestrator = Orchestrator::new(
            validation.clone(),
            settings(ReadinessGate::BeforeTrigger),
        );
        let tracker = ProgressTracker::hidden();

        let err = orchestrator
            .run(
                &release,
                &tracker,
                &CancellationToken::new(),
                &mut std::io::sink(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
        assert!(validation.triggers().is_empty());
        assert_eq!(tracker.snapshot().current, 2);
        assert!(tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn after_trigger_gate_waits_once_triggered() {
        let cluster = Arc::new(cluster("Pending"));
        let release = Release::new("app", "ns1", cluster.clone());
        let validation = Arc::new(FakeValidation::with_statuses(vec![finished()]));
        let orchestrator = Orchestrator::new(
            validation.clone(),
            settings(ReadinessGate::AfterTrigger),
        );

        let err = orchestrator
            .run(
                &release,
                &ProgressTracker::hidden(),
                &CancellationToken::new(),
                &mut std::io::sink(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ReadinessTimedOut);
        assert_eq!(validation.triggers().len(), 1);
        assert!(cluster.calls().list_pods > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_gate_never_lists_pods() {
        let cluster = Arc::new(cluster("Pending"));
        let release = Release::new("app", "ns1", cluster.clone());
        let validation = Arc::new(FakeValidation::with_statuses(vec![finished()]));
        let orchestrator =
            Orchestrator::new(validation, settings(ReadinessGate::Skip));
        let tracker = ProgressTracker::hidden();

        orchestrator
            .run(
                &release,
                &tracker,
                &CancellationToken::new(),
                &mut std::io::sink(),
            )
            .await
            .unwrap();

        assert_eq!(cluster.calls().list_pods, 0);
        assert_eq!(tracker.snapshot().total, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_readiness_stops_the_run() {
        let cluster = Arc::new(cluster("Pending"));
        let release = Release::new("app", "ns1", cluster.clone());
        let validation = Arc::new(FakeValidation::default());
        let orchestrator = Orchestrator::new(
            validation.clone(),
            settings(ReadinessGate::BeforeTrigger),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let err = orchestrator
            .run(
                &release,
                &ProgressTracker::hidden(),
                &cancel,
                &mut std::io::sink(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ReadinessCancelled);
        assert!(validation.triggers().is_empty());
    }

    #[tokio::test]
    async fn missing_cluster_client_is_reported() {
        let orchestrator = Orchestrator::new(
            Arc::new(FakeValidation::default()),
            settings(ReadinessGate::BeforeTrigger),
        );
        let tracker = ProgressTracker::hidden();

        let err = orchestrator
            .run(
                &NoCluster,
                &tracker,
                &CancellationToken::new(),
                &mut std::io::sink(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ClusterUnavailable);
        assert_eq!(tracker.snapshot().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_slow_cluster_lookup() {
        let cluster = Arc::new(cluster("Running").with_latency(Duration::from_secs(3600)));
        let release = Release::new("app", "ns1", cluster.clone());
        let validation = Arc::new(FakeValidation::default());
        let orchestrator =
            Orchestrator::new(validation.clone(), settings(ReadinessGate::Skip));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let err = orchestrator
            .run(
                &release,
                &ProgressTracker::hidden(),
                &cancel,
                &mut std::io::sink(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ResolveCancelled);
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("app-proxy"));
        assert!(start.elapsed() < Duration::from_secs(60));
        assert!(validation.triggers().is_empty());
    }
}
