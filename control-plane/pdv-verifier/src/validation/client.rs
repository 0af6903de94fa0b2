use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{
    TaskStatus, TriggerRequest, TriggerResponse, ValidationService,
    decode_status,
};
use crate::config::{TargetConfig, ValidationServiceConfig};
use crate::error::{TransportFailure, VerifyError};

/// [`ValidationService`] over HTTP/JSON.
pub struct HttpValidationClient {
    client: Client,
    base_url: String,
    trigger_path: String,
    status_path: String,
    running_sentinel: String,
    target: TargetConfig,
}

impl HttpValidationClient {
    pub fn new(
        service: &ValidationServiceConfig,
        target: &TargetConfig,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .user_agent(concat!("pdv-verifier/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = service.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: service.base_url(),
            trigger_path: service.trigger_path.clone(),
            status_path: service.status_path.clone(),
            running_sentinel: service.running_sentinel.clone(),
            target: target.clone(),
        })
    }

    /// URLs handed to the validation service for the workload at `address`.
    pub fn connection_urls(&self, address: &str) -> (String, String) {
        (
            format!(
                "{}://{}:{}",
                self.target.service_scheme, address, self.target.service_port
            ),
            format!("{}://{}", self.target.http_scheme, address),
        )
    }
}

#[async_trait]
impl ValidationService for HttpValidationClient {
    #[tracing::instrument(skip(self, credential))]
    async fn trigger(
        &self,
        address: &str,
        credential: &SecretString,
    ) -> Result<String, VerifyError> {
        let url = format!("{}{}", self.base_url, self.trigger_path);
        let (service_url, http_service_url) = self.connection_urls(address);
        let token = credential.expose_secret();
        info!(
            %url,
            %service_url,
            %http_service_url,
            token_len = token.len(),
            "triggering validation"
        );
        let body = TriggerRequest {
            service_url,
            http_service_url,
            auth_token: token,
        };

        let failed = |source: TransportFailure| VerifyError::TriggerFailed {
            url: url.clone(),
            source,
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(e.into()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(TransportFailure::Status(status)));
        }
        let text = response.text().await.map_err(|e| failed(e.into()))?;
        debug!(%status, body = %text, "trigger response");

        let parsed: TriggerResponse = serde_json::from_str(&text).map_err(|e| {
            VerifyError::TriggerResponseInvalid {
                reason: e.to_string(),
            }
        })?;
        match parsed.data.filter(|id| !id.trim().is_empty()) {
            Some(task_id) => {
                info!(%task_id, code = parsed.code, "validation task started");
                Ok(task_id)
            }
            None => Err(VerifyError::TriggerResponseInvalid {
                reason: format!(
                    "no task id in response (code {}, message {:?})",
                    parsed.code, parsed.message
                ),
            }),
        }
    }

    async fn query_status(&self, task_id: &str) -> Result<TaskStatus, VerifyError> {
        let url = format!("{}{}", self.base_url, self.status_path);
        let failed = |source: TransportFailure| VerifyError::PollTransportError {
            task_id: task_id.to_string(),
            source,
        };
        let response = self
            .client
            .get(&url)
            .query(&[("taskId", task_id)])
            .send()
            .await
            .map_err(|e| failed(e.into()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(TransportFailure::Status(status)));
        }
        let body = response.bytes().await.map_err(|e| failed(e.into()))?;

        decode_status(&body, &self.running_sentinel).map_err(|source| {
            VerifyError::StatusResponseInvalid {
                task_id: task_id.to_string(),
                source,
            }
        })
    }
}
