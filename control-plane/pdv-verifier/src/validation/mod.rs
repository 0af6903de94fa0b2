//! Talking to the external validation service: one trigger per run, then
//! status queries until the task reports its sub-test results.

mod client;
mod poller;
mod types;

pub use client::HttpValidationClient;
pub use poller::{PollPolicy, await_completion};
pub use types::{
    ErrorDetail, SubTestOutcome, TaskStatus, TriggerRequest, TriggerResponse,
    ValidationResult, decode_status,
};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::VerifyError;

/// The validation service as seen by the orchestrator.
#[async_trait]
pub trait ValidationService: Send + Sync {
    /// Starts a validation task against `address` and returns its id.
    /// Called once per run, never retried.
    async fn trigger(
        &self,
        address: &str,
        credential: &SecretString,
    ) -> Result<String, VerifyError>;

    /// Queries the current status of a task.
    async fn query_status(&self, task_id: &str) -> Result<TaskStatus, VerifyError>;
}
