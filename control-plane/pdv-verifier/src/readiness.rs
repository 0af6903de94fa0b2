use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use kube::ResourceExt;
use pdv_k8s::{ClusterClient, PodPhase};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::VerifyError;
use crate::report::emit;

/// Where the orchestrator waits for pods relative to the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessGate {
    #[default]
    BeforeTrigger,
    AfterTrigger,
    Skip,
}

impl FromStr for ReadinessGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" | "before-trigger" => Ok(Self::BeforeTrigger),
            "after" | "after-trigger" => Ok(Self::AfterTrigger),
            "skip" | "none" | "off" => Ok(Self::Skip),
            other => Err(format!("unknown readiness gate: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessOptions {
    pub timeout: Duration,
    pub interval: Duration,
    /// Accept a namespace without pods instead of waiting for some to show up.
    pub allow_empty: bool,
}

/// Polls the pods of `namespace` until every one of them is running or has
/// succeeded.
///
/// The first list happens immediately, then once per `interval`. Progress
/// lines go to `out`. Cancellation is checked before the deadline, so a
/// cancelled caller always gets [`VerifyError::ReadinessCancelled`]. Returns
/// the number of ready pods.
#[tracing::instrument(skip(client, opts, cancel, out))]
pub async fn wait_until_ready(
    client: &dyn ClusterClient,
    namespace: &str,
    opts: &ReadinessOptions,
    cancel: &CancellationToken,
    out: &mut (dyn Write + Send),
) -> Result<usize, VerifyError> {
    let deadline = tokio::time::sleep(opts.timeout);
    tokio::pin!(deadline);
    // `interval` panics on a zero period.
    let mut ticker = interval(opts.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(VerifyError::ReadinessCancelled {
                    namespace: namespace.to_string(),
                });
            }
            _ = &mut deadline => {
                return Err(VerifyError::ReadinessTimedOut {
                    namespace: namespace.to_string(),
                    timeout: opts.timeout,
                });
            }
            _ = ticker.tick() => {}
        }

        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(VerifyError::ReadinessCancelled {
                    namespace: namespace.to_string(),
                });
            }
            listed = client.list_pods(namespace) => listed,
        };
        let pods = listed.map_err(|e| {
            VerifyError::cluster(format!("listing pods in {namespace}"), e)
        })?;

        if pods.is_empty() {
            if opts.allow_empty {
                emit(out, format_args!("No pods in namespace {namespace}, continuing"));
                return Ok(0);
            }
            emit(out, format_args!("No pods found in namespace {namespace}"));
            continue;
        }

        let waiting: Vec<String> = pods
            .iter()
            .filter(|p| !PodPhase::of(p).is_ready())
            .map(|p| {
                let phase = p
                    .status
                    .as_ref()
                    .and_then(|s| s.phase.as_deref())
                    .unwrap_or("Unknown");
                format!("{}({})", p.name_any(), phase)
            })
            .collect();

        if waiting.is_empty() {
            info!(pods = pods.len(), "all pods ready");
            emit(
                out,
                format_args!("All {} pods in namespace {namespace} are running", pods.len()),
            );
            return Ok(pods.len());
        }

        debug!(waiting = waiting.len(), total = pods.len(), "pods not ready");
        emit(out, format_args!("Waiting for pods: {}", waiting.join(", ")));
    }
}
