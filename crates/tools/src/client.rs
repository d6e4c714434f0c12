//! HTTP client for the cloud-helper REST service.
//!
//! One shared client, one GET per tool invocation, a per-call timeout,
//! and no retries — a failed call is reported back to the model as the
//! tool's result, not retried behind its back.

use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failures talking to the helper service. Tools fold these into their
/// `ToolResult` output; they never escape a tool invocation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("helper request timed out after {0}s")]
    Timeout(u64),

    #[error("helper returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("helper unreachable: {0}")]
    Network(String),

    #[error("helper response malformed: {0}")]
    Decode(String),
}

/// Client for the cloud-helper service.
pub struct HelperClient {
    base_url: String,
    project_id: Option<String>,
    client: reqwest::Client,
}

impl HelperClient {
    pub fn new(base_url: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &nimbus_config::CloudConfig) -> Self {
        Self::new(&config.helper_base_url, config.project_id.clone())
    }

    /// GET `path` and decode the JSON body. Single attempt.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Helper request");

        let mut request = self.client.get(&url).timeout(timeout);
        if let Some(project) = &self.project_id {
            request = request.query(&[("project_id", project)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(timeout.as_secs())
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { code: status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}
