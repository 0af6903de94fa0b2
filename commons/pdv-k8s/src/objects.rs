//! Constructors for the handful of core objects the verifier reads.
//!
//! Only the fields the verifier looks at are populated.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{
    LoadBalancerIngress, LoadBalancerStatus, Node, NodeAddress, NodeStatus, Pod,
    PodStatus, Secret, Service, ServiceSpec, ServiceStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn pod(name: &str, phase: &str) -> Pod {
    Pod {
        metadata: meta(name),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A node with the given `(type, address)` pairs, e.g. `("InternalIP", "10.0.0.1")`.
pub fn node(name: &str, addresses: &[(&str, &str)]) -> Node {
    let addresses = addresses
        .iter()
        .map(|(type_, address)| NodeAddress {
            type_: type_.to_string(),
            address: address.to_string(),
        })
        .collect();
    Node {
        metadata: meta(name),
        status: Some(NodeStatus {
            addresses: Some(addresses),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A service of the given type (`LoadBalancer`, `NodePort`, `ClusterIP`, ...).
pub fn service(name: &str, type_: &str, cluster_ip: Option<&str>) -> Service {
    Service {
        metadata: meta(name),
        spec: Some(ServiceSpec {
            type_: Some(type_.to_string()),
            cluster_ip: cluster_ip.map(str::to_string),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A `LoadBalancer` service with one ingress entry per `(ip, hostname)` pair.
pub fn load_balancer_service(
    name: &str,
    cluster_ip: Option<&str>,
    ingress: &[(Option<&str>, Option<&str>)],
) -> Service {
    let mut svc = service(name, "LoadBalancer", cluster_ip);
    let ingress = ingress
        .iter()
        .map(|(ip, hostname)| LoadBalancerIngress {
            ip: ip.map(str::to_string),
            hostname: hostname.map(str::to_string),
            ..Default::default()
        })
        .collect();
    svc.status = Some(ServiceStatus {
        load_balancer: Some(LoadBalancerStatus {
            ingress: Some(ingress),
        }),
        ..Default::default()
    });
    svc
}

/// A secret holding a single `key`.
pub fn secret(name: &str, key: &str, value: &[u8]) -> Secret {
    let data: BTreeMap<String, ByteString> =
        BTreeMap::from([(key.to_string(), ByteString(value.to_vec()))]);
    Secret {
        metadata: meta(name),
        data: Some(data),
        ..Default::default()
    }
}
