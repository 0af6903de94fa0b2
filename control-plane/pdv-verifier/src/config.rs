use std::time::Duration;

use envconfig::Envconfig;
use tracing::warn;

use crate::readiness::ReadinessGate;

#[derive(Envconfig, Clone, Debug)]
pub struct VerifierConfig {
    /// Release whose proxy service and token secret are verified.
    /// Env: PDV_RELEASE_NAME
    #[envconfig(from = "PDV_RELEASE_NAME")]
    pub release_name: String,

    #[envconfig(from = "PDV_NAMESPACE", default = "default")]
    pub namespace: String,

    #[envconfig(nested)]
    pub validation: ValidationServiceConfig,

    #[envconfig(nested)]
    pub target: TargetConfig,

    #[envconfig(nested)]
    pub readiness: ReadinessConfig,

    #[envconfig(nested)]
    pub poll: PollConfig,
}

/// Where the external validation service lives and how it talks.
#[derive(Envconfig, Clone, Debug)]
pub struct ValidationServiceConfig {
    #[envconfig(from = "PDV_VALIDATION_SCHEME", default = "http")]
    pub scheme: String,
    #[envconfig(from = "PDV_VALIDATION_HOST", default = "127.0.0.1")]
    pub host: String,
    #[envconfig(from = "PDV_VALIDATION_PORT", default = "8080")]
    pub port: u16,
    #[envconfig(from = "PDV_VALIDATION_TRIGGER_PATH", default = "/testpulsar")]
    pub trigger_path: String,
    #[envconfig(
        from = "PDV_VALIDATION_STATUS_PATH",
        default = "/testpulsar/status"
    )]
    pub status_path: String,
    /// Per-request timeout. 0 disables it.
    /// Env: PDV_VALIDATION_REQUEST_TIMEOUT_SECS
    #[envconfig(from = "PDV_VALIDATION_REQUEST_TIMEOUT_SECS", default = "30")]
    pub request_timeout_secs: u64,
    /// Literal `data` value the service returns while a task is executing.
    /// Env: PDV_VALIDATION_RUNNING_SENTINEL
    #[envconfig(
        from = "PDV_VALIDATION_RUNNING_SENTINEL",
        default = "任务正在执行中"
    )]
    pub running_sentinel: String,
}

/// How the deployed workload is addressed and named.
#[derive(Envconfig, Clone, Debug)]
pub struct TargetConfig {
    #[envconfig(from = "PDV_TARGET_SERVICE_SCHEME", default = "pulsar")]
    pub service_scheme: String,
    #[envconfig(from = "PDV_TARGET_SERVICE_PORT", default = "6650")]
    pub service_port: u16,
    #[envconfig(from = "PDV_TARGET_HTTP_SCHEME", default = "http")]
    pub http_scheme: String,
    #[envconfig(from = "PDV_PROXY_SERVICE_SUFFIX", default = "-proxy")]
    pub proxy_service_suffix: String,
    #[envconfig(
        from = "PDV_TOKEN_SECRET_SUFFIX",
        default = "-token-proxy-admin"
    )]
    pub token_secret_suffix: String,
    #[envconfig(from = "PDV_TOKEN_SECRET_KEY", default = "TOKEN")]
    pub token_secret_key: String,
}

#[derive(Envconfig, Clone, Debug)]
pub struct ReadinessConfig {
    #[envconfig(from = "PDV_READINESS_TIMEOUT_SECS", default = "900")]
    pub timeout_secs: u64,
    #[envconfig(from = "PDV_READINESS_INTERVAL_SECS", default = "15")]
    pub interval_secs: u64,
    /// before | after | skip
    /// Env: PDV_READINESS_GATE
    #[envconfig(from = "PDV_READINESS_GATE", default = "before")]
    pub gate: String,
    /// Treat a namespace without pods as ready instead of waiting.
    /// Env: PDV_READINESS_ALLOW_EMPTY
    #[envconfig(from = "PDV_READINESS_ALLOW_EMPTY", default = "false")]
    pub allow_empty: bool,
}

#[derive(Envconfig, Clone, Debug)]
pub struct PollConfig {
    #[envconfig(from = "PDV_POLL_MAX_ATTEMPTS", default = "60")]
    pub max_attempts: u32,
    #[envconfig(from = "PDV_POLL_INTERVAL_SECS", default = "10")]
    pub interval_secs: u64,
}

impl ValidationServiceConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }
}

impl ReadinessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Parsed gate; unknown values fall back to waiting before the trigger.
    pub fn gate(&self) -> ReadinessGate {
        self.gate.parse().unwrap_or_else(|_| {
            warn!(gate = %self.gate, "unknown readiness gate, using 'before'");
            ReadinessGate::BeforeTrigger
        })
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
