use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod, Secret, Service};
use kube::{
    Client,
    api::{Api, ListParams},
};
use tracing::trace;

use crate::K8sError;

/// Cluster operations needed to verify a release. All of them are reads.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Retrieves a named [`Service`], or [`K8sError::NotFound`].
    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Service, K8sError>;

    /// Lists every [`Node`] in the cluster, in API server order.
    async fn list_nodes(&self) -> Result<Vec<Node>, K8sError>;

    /// Retrieves a named [`Secret`], or [`K8sError::NotFound`].
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Secret, K8sError>;

    /// Lists every [`Pod`] in the namespace.
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, K8sError>;
}

/// [`ClusterClient`] backed by a live API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Service, K8sError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        trace!(%namespace, %name, "get service");
        api.get_opt(name)
            .await?
            .ok_or_else(|| K8sError::not_found("Service", namespace, name))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, K8sError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await?;
        trace!(count = nodes.items.len(), "listed nodes");
        Ok(nodes.items)
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Secret, K8sError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        trace!(%namespace, %name, "get secret");
        api.get_opt(name)
            .await?
            .ok_or_else(|| K8sError::not_found("Secret", namespace, name))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, K8sError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default()).await?;
        trace!(%namespace, count = pods.items.len(), "listed pods");
        Ok(pods.items)
    }
}
