use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::StatusDecodeError;

/// Body of the trigger call.
///
/// Holds the exposed token, so it deliberately has no `Debug`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest<'a> {
    pub service_url: String,
    pub http_service_url: String,
    pub auth_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Outer status envelope. `data` is either the "still executing" string or
/// the list of sub-test entries.
#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RawSubTest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

/// Structured error a sub-test may embed, as JSON, in its message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[serde(default)]
    pub error_msg: String,
    #[serde(default)]
    pub req_id: i64,
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTestOutcome {
    pub name: String,
    /// Message exactly as the service sent it.
    pub message: String,
    /// `None` when the message is not a structured error record.
    pub error: Option<ErrorDetail>,
}

impl SubTestOutcome {
    pub fn from_raw(name: String, message: String) -> Self {
        let error = match serde_json::from_str::<ErrorDetail>(&message) {
            Ok(detail) => Some(detail),
            Err(e) => {
                debug!(sub_test = %name, error = %e, "message is not a structured error");
                None
            }
        };
        Self {
            name,
            message,
            error,
        }
    }

    pub fn passed(&self) -> bool {
        self.error
            .as_ref()
            .map(|e| e.error_msg.is_empty())
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Finished(Vec<SubTestOutcome>),
}

/// Result of a finished validation task. Judging pass/fail is up to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub task_id: String,
    pub entries: Vec<SubTestOutcome>,
}

impl ValidationResult {
    pub fn failed(&self) -> impl Iterator<Item = &SubTestOutcome> {
        self.entries.iter().filter(|e| !e.passed())
    }

    pub fn all_passed(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Decodes a status body.
///
/// The envelope must be valid JSON. An empty entry list means the task has
/// not produced results yet and is reported as [`TaskStatus::Running`].
pub fn decode_status(
    body: &[u8],
    running_sentinel: &str,
) -> Result<TaskStatus, StatusDecodeError> {
    let envelope: StatusEnvelope =
        serde_json::from_slice(body).map_err(StatusDecodeError::Envelope)?;
    debug!(code = envelope.code, message = %envelope.message, "status envelope");

    match envelope.data {
        Value::String(s) if s == running_sentinel => Ok(TaskStatus::Running),
        Value::Array(items) if items.is_empty() => Ok(TaskStatus::Running),
        Value::Array(items) => {
            let raw: Vec<RawSubTest> = serde_json::from_value(Value::Array(items))
                .map_err(StatusDecodeError::Entries)?;
            Ok(TaskStatus::Finished(
                raw.into_iter()
                    .map(|r| SubTestOutcome::from_raw(r.name, r.message))
                    .collect(),
            ))
        }
        Value::String(s) => Err(StatusDecodeError::UnexpectedString(s)),
        other => Err(StatusDecodeError::UnexpectedData(other)),
    }
}
