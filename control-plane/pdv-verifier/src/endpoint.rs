use std::fmt;

use k8s_openapi::api::core::v1::Service;
use pdv_k8s::ClusterClient;
use tracing::{debug, info};

use crate::VerifyError;

/// How a service is exposed, classified once from `spec.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceExposure {
    LoadBalanced,
    NodeExposed,
    ClusterInternal,
    Unknown,
}

impl ServiceExposure {
    pub fn classify(svc: &Service) -> Self {
        match svc.spec.as_ref().and_then(|s| s.type_.as_deref()) {
            Some("LoadBalancer") => Self::LoadBalanced,
            Some("NodePort") => Self::NodeExposed,
            // Kubernetes defaults an unset type to ClusterIP.
            Some("ClusterIP") | None => Self::ClusterInternal,
            Some(_) => Self::Unknown,
        }
    }
}

impl fmt::Display for ServiceExposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LoadBalanced => "LoadBalancer",
            Self::NodeExposed => "NodePort",
            Self::ClusterInternal => "ClusterIP",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Which field an address was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    IngressIp,
    IngressHostname,
    NodeExternalIp,
    NodeInternalIp,
    ClusterIp,
}

/// Reachable address of a service, recomputed on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub service: String,
    pub address: String,
    pub source: AddressSource,
}

/// Resolves the address at which `service` can be reached.
///
/// Load balancer ingress wins, then the first node's addresses for node
/// ports, then the cluster IP. Each stage falls through to the next when it
/// has nothing to offer.
#[tracing::instrument(skip(client))]
pub async fn resolve_endpoint(
    client: &dyn ClusterClient,
    namespace: &str,
    service: &str,
) -> Result<ServiceEndpoint, VerifyError> {
    let svc = match client.get_service(namespace, service).await {
        Ok(svc) => svc,
        Err(e) if e.is_not_found() => {
            return Err(VerifyError::EndpointNotFound {
                namespace: namespace.to_string(),
                service: service.to_string(),
                service_type: "absent".into(),
            });
        }
        Err(e) => {
            return Err(VerifyError::cluster(
                format!("getting service {namespace}/{service}"),
                e,
            ));
        }
    };

    let exposure = ServiceExposure::classify(&svc);
    debug!(%exposure, "classified service");

    let exposed = match exposure {
        ServiceExposure::LoadBalanced => ingress_address(&svc),
        ServiceExposure::NodeExposed => first_node_address(client).await?,
        ServiceExposure::ClusterInternal | ServiceExposure::Unknown => None,
    };

    let (address, source) = exposed
        .or_else(|| cluster_ip(&svc))
        .ok_or_else(|| VerifyError::EndpointNotFound {
            namespace: namespace.to_string(),
            service: service.to_string(),
            service_type: svc
                .spec
                .as_ref()
                .and_then(|s| s.type_.clone())
                .unwrap_or_else(|| exposure.to_string()),
        })?;

    info!(%address, ?source, "resolved service endpoint");
    Ok(ServiceEndpoint {
        service: service.to_string(),
        address,
        source,
    })
}

fn ingress_address(svc: &Service) -> Option<(String, AddressSource)> {
    let first = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|ingress| ingress.first())?;
    if let Some(ip) = first.ip.as_ref().filter(|ip| !ip.is_empty()) {
        return Some((ip.clone(), AddressSource::IngressIp));
    }
    first
        .hostname
        .as_ref()
        .filter(|h| !h.is_empty())
        .map(|h| (h.clone(), AddressSource::IngressHostname))
}

async fn first_node_address(
    client: &dyn ClusterClient,
) -> Result<Option<(String, AddressSource)>, VerifyError> {
    let nodes = client
        .list_nodes()
        .await
        .map_err(|e| VerifyError::cluster("listing nodes", e))?;
    let Some(addresses) = nodes
        .first()
        .and_then(|n| n.status.as_ref())
        .and_then(|s| s.addresses.as_ref())
    else {
        return Ok(None);
    };

    let find = |type_: &str| {
        addresses
            .iter()
            .find(|a| a.type_ == type_ && !a.address.is_empty())
            .map(|a| a.address.clone())
    };
    Ok(find("ExternalIP")
        .map(|a| (a, AddressSource::NodeExternalIp))
        .or_else(|| find("InternalIP").map(|a| (a, AddressSource::NodeInternalIp))))
}

fn cluster_ip(svc: &Service) -> Option<(String, AddressSource)> {
    svc.spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_ref())
        .filter(|ip| !ip.is_empty() && ip.as_str() != "None")
        .map(|ip| (ip.clone(), AddressSource::ClusterIp))
}
