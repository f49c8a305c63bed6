//! HTTP implementation of the executor client
//!
//! Actions run via `POST {base}/run/{action}` with the run input as body;
//! validation goes through `POST {base}/validate/{name}` with `{"args": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::client::{ExecutorClient, ExecutorError, ValidateResponse, format_error_detail};
use crate::domain::RunActionInput;
use crate::error::{FlowlogError, Result};

/// Default executor base URL
const DEFAULT_EXECUTOR_URL: &str = "http://localhost:8002";

/// Retry delay assumed when a 429 carries no usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Configuration for the HTTP executor client
#[derive(Debug, Clone)]
pub struct HttpExecutorConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Sent as the `workspace_id` query parameter when set
    pub workspace_id: Option<String>,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EXECUTOR_URL.to_string(),
            timeout: Duration::from_secs(300),
            workspace_id: None,
        }
    }
}

/// Executor client over reqwest
#[derive(Debug)]
pub struct HttpExecutorClient {
    client: Client,
    config: HttpExecutorConfig,
}

impl HttpExecutorClient {
    pub fn new(config: HttpExecutorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FlowlogError::Collaborator(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpExecutorConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, action: &str, path: &str, body: &Value) -> std::result::Result<Response, ExecutorError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(workspace_id) = &self.config.workspace_id {
            request = request.query(&[("workspace_id", workspace_id)]);
        }
        trace!("POST {} for action {}", path, action);

        let response = request.send().await.map_err(|e| network_error(action, e))?;
        check_status(action, response).await
    }
}

fn network_error(action: &str, e: reqwest::Error) -> ExecutorError {
    if e.is_timeout() {
        ExecutorError::Timeout {
            action: action.to_string(),
        }
    } else {
        ExecutorError::Network {
            action: action.to_string(),
            source: e,
        }
    }
}

async fn check_status(action: &str, response: Response) -> std::result::Result<Response, ExecutorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ExecutorError::RateLimited {
            action: action.to_string(),
            retry_after: Duration::from_secs(retry_after),
        });
    }

    let body = response.text().await.unwrap_or_default();
    let detail = format_error_detail(&body);
    warn!("Executor returned {} for action {}: {}", status, action, detail);
    if status.is_server_error() {
        Err(ExecutorError::Server {
            action: action.to_string(),
            status: status.as_u16(),
            detail,
        })
    } else {
        Err(ExecutorError::Client {
            action: action.to_string(),
            status: status.as_u16(),
            detail,
        })
    }
}

async fn decode<T: DeserializeOwned>(action: &str, response: Response) -> std::result::Result<T, ExecutorError> {
    let bytes = response.bytes().await.map_err(|e| network_error(action, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ExecutorError::Decode {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ExecutorClient for HttpExecutorClient {
    async fn run_action(&self, input: &RunActionInput) -> std::result::Result<Value, ExecutorError> {
        let Some(task) = &input.task else {
            return Err(ExecutorError::InvalidInput("run input has no task".to_string()));
        };
        let action = task.action.as_str();
        let body = serde_json::to_value(input).map_err(|e| ExecutorError::InvalidInput(e.to_string()))?;
        debug!("Running action {} ({})", action, task.action_ref);

        let response = self.post(action, &format!("run/{}", action), &body).await?;
        decode(action, response).await
    }

    async fn validate_action(
        &self,
        action_name: &str,
        args: &Value,
    ) -> std::result::Result<ValidateResponse, ExecutorError> {
        debug!("Validating action {}", action_name);
        let response = self
            .post(action_name, &format!("validate/{}", action_name), &json!({ "args": args }))
            .await?;
        decode(action_name, response).await
    }
}
