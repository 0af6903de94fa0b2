use std::time::Duration;

use pdv_k8s::K8sError;
use thiserror::Error;

/// Why an HTTP exchange with the validation service failed.
#[derive(Error, Debug)]
pub enum TransportFailure {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request failed with status: {0}")]
    Status(reqwest::StatusCode),
}

/// Why a status body could not be decoded.
#[derive(Error, Debug)]
pub enum StatusDecodeError {
    #[error("malformed status envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("malformed sub-test entries: {0}")]
    Entries(#[source] serde_json::Error),

    #[error("unexpected status string: {0}")]
    UnexpectedString(String),

    #[error("unexpected status data: {0}")]
    UnexpectedData(serde_json::Value),
}

/// Errors that end a verification run. None of them are retried.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error(
        "no reachable address for service {service} in namespace {namespace} (type: {service_type})"
    )]
    EndpointNotFound {
        namespace: String,
        service: String,
        service_type: String,
    },

    #[error("credential missing in secret {secret} (namespace {namespace}): {reason}")]
    CredentialMissing {
        namespace: String,
        secret: String,
        reason: String,
    },

    #[error("validation trigger to {url} failed: {source}")]
    TriggerFailed {
        url: String,
        #[source]
        source: TransportFailure,
    },

    #[error("validation trigger for {address} was cancelled")]
    TriggerCancelled { address: String },

    #[error("validation trigger response is invalid: {reason}")]
    TriggerResponseInvalid { reason: String },

    #[error("status query for task {task_id} failed: {source}")]
    PollTransportError {
        task_id: String,
        #[source]
        source: TransportFailure,
    },

    #[error("status response for task {task_id} is invalid: {source}")]
    StatusResponseInvalid {
        task_id: String,
        #[source]
        source: StatusDecodeError,
    },

    #[error("task {task_id} did not finish after {attempts} status queries")]
    PollTimedOut { task_id: String, attempts: u32 },

    #[error("waiting for task {task_id} was cancelled")]
    PollCancelled { task_id: String },

    #[error("pods in namespace {namespace} not ready after {timeout:?}")]
    ReadinessTimedOut { namespace: String, timeout: Duration },

    #[error("waiting for pods in namespace {namespace} was cancelled")]
    ReadinessCancelled { namespace: String },

    #[error("resolving {what} {name} in namespace {namespace} was cancelled")]
    ResolveCancelled {
        what: &'static str,
        namespace: String,
        name: String,
    },

    #[error("cluster request failed while {context}: {source}")]
    Cluster {
        context: String,
        #[source]
        source: K8sError,
    },

    #[error("no cluster client for release {release}: {source}")]
    ClusterUnavailable {
        release: String,
        #[source]
        source: K8sError,
    },
}

/// Fieldless discriminant of [`VerifyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EndpointNotFound,
    CredentialMissing,
    TriggerFailed,
    TriggerCancelled,
    TriggerResponseInvalid,
    PollTransportError,
    StatusResponseInvalid,
    PollTimedOut,
    PollCancelled,
    ReadinessTimedOut,
    ReadinessCancelled,
    ResolveCancelled,
    Cluster,
    ClusterUnavailable,
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EndpointNotFound { .. } => ErrorKind::EndpointNotFound,
            Self::CredentialMissing { .. } => ErrorKind::CredentialMissing,
            Self::TriggerFailed { .. } => ErrorKind::TriggerFailed,
            Self::TriggerCancelled { .. } => ErrorKind::TriggerCancelled,
            Self::TriggerResponseInvalid { .. } => {
                ErrorKind::TriggerResponseInvalid
            }
            Self::PollTransportError { .. } => ErrorKind::PollTransportError,
            Self::StatusResponseInvalid { .. } => {
                ErrorKind::StatusResponseInvalid
            }
            Self::PollTimedOut { .. } => ErrorKind::PollTimedOut,
            Self::PollCancelled { .. } => ErrorKind::PollCancelled,
            Self::ReadinessTimedOut { .. } => ErrorKind::ReadinessTimedOut,
            Self::ReadinessCancelled { .. } => ErrorKind::ReadinessCancelled,
            Self::ResolveCancelled { .. } => ErrorKind::ResolveCancelled,
            Self::Cluster { .. } => ErrorKind::Cluster,
            Self::ClusterUnavailable { .. } => ErrorKind::ClusterUnavailable,
        }
    }

    pub fn cluster(context: impl Into<String>, source: K8sError) -> Self {
        Self::Cluster {
            context: context.into(),
            source,
        }
    }

    /// True for the kinds raised when the caller aborted the run.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PollCancelled
                | ErrorKind::ReadinessCancelled
                | ErrorKind::TriggerCancelled
                | ErrorKind::ResolveCancelled
        )
    }
}
