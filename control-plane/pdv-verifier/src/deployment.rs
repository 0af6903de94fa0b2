use std::sync::Arc;

use pdv_k8s::{ClusterClient, K8sError, KubeClusterClient};

use crate::config::TargetConfig;

/// A deployed release, as handed over by the deployment engine.
pub trait Deployment: Send + Sync {
    fn release_name(&self) -> &str;

    fn namespace(&self) -> &str;

    /// Client for the cluster the release lives in.
    fn cluster_client(&self) -> Result<Arc<dyn ClusterClient>, K8sError>;
}

/// A named release reachable through a cluster client.
pub struct Release {
    name: String,
    namespace: String,
    client: Arc<dyn ClusterClient>,
}

impl Release {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        client: Arc<dyn ClusterClient>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            client,
        }
    }

    pub fn from_kube(
        name: impl Into<String>,
        namespace: impl Into<String>,
        client: kube::Client,
    ) -> Self {
        Self::new(name, namespace, Arc::new(KubeClusterClient::new(client)))
    }
}

impl Deployment for Release {
    fn release_name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn cluster_client(&self) -> Result<Arc<dyn ClusterClient>, K8sError> {
        Ok(self.client.clone())
    }
}

/// `<release><suffix>`, e.g. `app-proxy`.
pub fn proxy_service_name(release: &str, target: &TargetConfig) -> String {
    format!("{release}{}", target.proxy_service_suffix)
}

/// `<release><suffix>`, e.g. `app-token-proxy-admin`.
pub fn token_secret_name(release: &str, target: &TargetConfig) -> String {
    format!("{release}{}", target.token_secret_suffix)
}
