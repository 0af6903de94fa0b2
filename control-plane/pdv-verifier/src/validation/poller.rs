use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{TaskStatus, ValidationResult, ValidationService};
use crate::VerifyError;

/// Bounds on waiting for a task.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Queries `task_id` until it reports results.
///
/// Only the "still executing" status is retried, after `interval`. Transport
/// and decode failures surface immediately. Running out of attempts is
/// [`VerifyError::PollTimedOut`].
#[tracing::instrument(skip(service, policy, cancel))]
pub async fn await_completion(
    service: &dyn ValidationService,
    task_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<ValidationResult, VerifyError> {
    let cancelled = || VerifyError::PollCancelled {
        task_id: task_id.to_string(),
    };
    let attempts = policy.attempts();

    for attempt in 1..=attempts {
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            status = service.query_status(task_id) => status?,
        };

        match status {
            TaskStatus::Finished(entries) => {
                info!(attempt, entries = entries.len(), "validation task finished");
                return Ok(ValidationResult {
                    task_id: task_id.to_string(),
                    entries,
                });
            }
            TaskStatus::Running => {
                debug!(attempt, attempts, "validation task still running");
            }
        }

        if attempt < attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    Err(VerifyError::PollTimedOut {
        task_id: task_id.to_string(),
        attempts,
    })
}
