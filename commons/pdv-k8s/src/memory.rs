use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod, Secret, Service};
use kube::ResourceExt;

use crate::{ClusterClient, K8sError};

/// Number of calls served per operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub get_service: usize,
    pub list_nodes: usize,
    pub get_secret: usize,
    pub list_pods: usize,
}

#[derive(Default)]
struct State {
    services: HashMap<(String, String), Service>,
    secrets: HashMap<(String, String), Secret>,
    nodes: Vec<Node>,
    // Per namespace. Each list call consumes the front snapshot; the last one
    // is served forever.
    pod_snapshots: HashMap<String, VecDeque<Vec<Pod>>>,
    calls: CallCounts,
    latency: Option<Duration>,
}

/// [`ClusterClient`] over a fixed set of objects.
///
/// Pod lists are scripted: every [`InMemoryCluster::with_pods`] call appends
/// one snapshot, so a test can make pods change phase between polls.
#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_service(self, namespace: &str, service: Service) -> Self {
        let key = (namespace.to_string(), service.name_any());
        self.lock().services.insert(key, service);
        self
    }

    pub fn with_secret(self, namespace: &str, secret: Secret) -> Self {
        let key = (namespace.to_string(), secret.name_any());
        self.lock().secrets.insert(key, secret);
        self
    }

    pub fn with_node(self, node: Node) -> Self {
        self.lock().nodes.push(node);
        self
    }

    pub fn with_pods(self, namespace: &str, pods: Vec<Pod>) -> Self {
        self.lock()
            .pod_snapshots
            .entry(namespace.to_string())
            .or_default()
            .push_back(pods);
        self
    }

    /// Every call waits `latency` after being counted and before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    async fn respond_after_latency(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Service, K8sError> {
        self.lock().calls.get_service += 1;
        self.respond_after_latency().await;
        let state = self.lock();
        state
            .services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| K8sError::not_found("Service", namespace, name))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, K8sError> {
        self.lock().calls.list_nodes += 1;
        self.respond_after_latency().await;
        let state = self.lock();
        Ok(state.nodes.clone())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Secret, K8sError> {
        self.lock().calls.get_secret += 1;
        self.respond_after_latency().await;
        let state = self.lock();
        state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| K8sError::not_found("Secret", namespace, name))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, K8sError> {
        self.lock().calls.list_pods += 1;
        self.respond_after_latency().await;
        let mut state = self.lock();
        let pods = match state.pod_snapshots.get_mut(namespace) {
            Some(snapshots) if snapshots.len() > 1 => {
                snapshots.pop_front().unwrap_or_default()
            }
            Some(snapshots) => snapshots.front().cloned().unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(pods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{pod, secret, service};

    #[tokio::test]
    async fn pod_snapshots_advance_then_stick() {
        let cluster = InMemoryCluster::new()
            .with_pods("ns", vec![pod("a", "Pending")])
            .with_pods("ns", vec![pod("a", "Running")]);

        let first = cluster.list_pods("ns").await.unwrap();
        let second = cluster.list_pods("ns").await.unwrap();
        let third = cluster.list_pods("ns").await.unwrap();

        assert_eq!(first[0].status.as_ref().unwrap().phase.as_deref(), Some("Pending"));
        assert_eq!(second[0].status.as_ref().unwrap().phase.as_deref(), Some("Running"));
        assert_eq!(third[0].status.as_ref().unwrap().phase.as_deref(), Some("Running"));
        assert_eq!(cluster.calls().list_pods, 3);
    }

    #[tokio::test]
    async fn missing_objects_are_not_found() {
        let cluster = InMemoryCluster::new()
            .with_service("ns", service("svc", "ClusterIP", Some("10.96.0.1")))
            .with_secret("ns", secret("tok", "TOKEN", b"x"));

        assert!(cluster.get_service("ns", "svc").await.is_ok());
        assert!(cluster.get_service("other", "svc").await.unwrap_err().is_not_found());
        assert!(cluster.get_secret("ns", "nope").await.unwrap_err().is_not_found());
        assert!(cluster.list_pods("empty").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_answers() {
        let cluster = InMemoryCluster::new()
            .with_pods("ns", vec![pod("a", "Running")])
            .with_latency(Duration::from_secs(30));

        let start = tokio::time::Instant::now();
        let pods = cluster.list_pods("ns").await.unwrap();

        assert_eq!(pods.len(), 1);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
