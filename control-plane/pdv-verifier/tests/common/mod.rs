#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};

use envconfig::Envconfig;
use pdv_k8s::InMemoryCluster;
use pdv_k8s::objects::{node, pod, secret, service};
use pdv_verifier::config::VerifierConfig;
use serde_json::json;
use wiremock::{MockServer, ResponseTemplate};

pub const RUNNING: &str = "任务正在执行中";

// Env guard utilities
pub struct EnvGuard {
    key: &'static str,
    old: Option<String>,
}
impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(ref v) = self.old {
                std::env::set_var(self.key, v);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }
}
pub fn set_env(key: &'static str, val: &str) -> EnvGuard {
    let old = std::env::var(key).ok();
    unsafe {
        std::env::set_var(key, val);
    }
    EnvGuard { key, old }
}

/// Config for release `app` in `ns1`, pointed at `server`, with short waits.
pub fn config_for(server: &MockServer, extra: &[(&str, &str)]) -> VerifierConfig {
    config_at(*server.address(), extra)
}

/// Same as [`config_for`] for an arbitrary validation service address.
pub fn config_at(addr: SocketAddr, extra: &[(&str, &str)]) -> VerifierConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("PDV_RELEASE_NAME".to_string(), "app".to_string()),
        ("PDV_NAMESPACE".to_string(), "ns1".to_string()),
        ("PDV_VALIDATION_HOST".to_string(), addr.ip().to_string()),
        ("PDV_VALIDATION_PORT".to_string(), addr.port().to_string()),
        ("PDV_VALIDATION_REQUEST_TIMEOUT_SECS".to_string(), "5".to_string()),
        ("PDV_READINESS_TIMEOUT_SECS".to_string(), "5".to_string()),
        ("PDV_READINESS_INTERVAL_SECS".to_string(), "1".to_string()),
        ("PDV_POLL_MAX_ATTEMPTS".to_string(), "5".to_string()),
        ("PDV_POLL_INTERVAL_SECS".to_string(), "0".to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    VerifierConfig::init_from_hashmap(&vars).expect("valid test config")
}

/// `app` deployed to `ns1`: node-exposed proxy, token secret, two running pods.
pub fn deployed_cluster() -> InMemoryCluster {
    InMemoryCluster::new()
        .with_service("ns1", service("app-proxy", "NodePort", Some("10.96.0.7")))
        .with_node(node(
            "node-a",
            &[("InternalIP", "192.168.1.10"), ("ExternalIP", "10.0.0.5")],
        ))
        .with_secret("ns1", secret("app-token-proxy-admin", "TOKEN", b"abc123"))
        .with_pods("ns1", vec![pod("app-0", "Running"), pod("app-1", "Running")])
}

pub fn envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 0,
        "message": "success",
        "data": data,
    }))
}

pub fn still_running() -> ResponseTemplate {
    envelope(json!(RUNNING))
}

/// An address nothing listens on.
pub fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}
