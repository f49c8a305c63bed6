//! Executor client types and trait definitions

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::RunActionInput;

/// Remote action-execution service
#[async_trait]
pub trait ExecutorClient: Send + Sync {
    /// Run one action and return its JSON result
    async fn run_action(&self, input: &RunActionInput) -> Result<Value, ExecutorError>;

    /// Validate arguments for a registered action
    async fn validate_action(&self, action_name: &str, args: &Value) -> Result<ValidateResponse, ExecutorError>;
}

/// Result of validating action arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub detail: Option<Value>,
}

/// Structured error the executor reports for a failed action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionErrorInfo {
    pub action_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub filename: String,
    pub function: String,
    pub lineno: Option<u64>,
}

impl ActionErrorInfo {
    /// Field names an error-info object may carry
    pub const FIELDS: [&'static str; 6] = ["action_name", "type", "message", "filename", "function", "lineno"];

    /// Whether `value` is an object whose keys are all error-info fields
    pub fn looks_like(value: &Value) -> bool {
        match value.as_object() {
            Some(map) => map.keys().all(|k| Self::FIELDS.contains(&k.as_str())),
            None => false,
        }
    }
}

impl std::fmt::Display for ActionErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.action_name.is_empty() {
            write!(f, "\n\nAction: {}", self.action_name)?;
        }
        if !self.filename.is_empty() {
            write!(f, "\nFile: {}", self.filename)?;
            if let Some(lineno) = self.lineno {
                write!(f, ":{}", lineno)?;
            }
        }
        if !self.function.is_empty() {
            write!(f, "\nFunction: {}", self.function)?;
        }
        Ok(())
    }
}

/// Render an executor error body for humans
///
/// A `{"detail": {...}}` error-info object is rendered as such. A list of them
/// renders the first, noting how many similar errors there were. Anything else
/// is returned as the raw body.
pub fn format_error_detail(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    let Some(detail) = parsed.get("detail") else {
        return body.to_string();
    };

    if ActionErrorInfo::looks_like(detail) {
        if let Ok(info) = serde_json::from_value::<ActionErrorInfo>(detail.clone()) {
            return info.to_string();
        }
    }

    if let Some(items) = detail.as_array() {
        if !items.is_empty() && items.iter().all(ActionErrorInfo::looks_like) {
            if let Ok(first) = serde_json::from_value::<ActionErrorInfo>(items[0].clone()) {
                let mut parts = Vec::new();
                if items.len() > 1 {
                    parts.push(format!("Showing the first of {} similar errors.", items.len()));
                }
                parts.push(first.to_string());
                return parts.join("\n\n");
            }
        }
    }

    body.to_string()
}

/// Errors that can occur when calling the executor
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Timeout calling action '{action}' in executor")]
    Timeout { action: String },

    #[error("Error decoding JSON response for action '{action}': {reason}")]
    Decode { action: String, reason: String },

    #[error("Rate limited calling action '{action}', retry after {retry_after:?}")]
    RateLimited { action: String, retry_after: Duration },

    #[error("There was an error in the executor when calling action '{action}'.\n\n{detail}")]
    Server { action: String, status: u16, detail: String },

    #[error("Unexpected executor error ({status}) for action '{action}':\n\n{detail}")]
    Client { action: String, status: u16, detail: String },

    #[error("Network error calling action '{action}': {source}")]
    Network {
        action: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid executor request: {0}")]
    InvalidInput(String),
}

impl ExecutorError {
    /// Action key the failed call was for
    pub fn action(&self) -> Option<&str> {
        match self {
            ExecutorError::Timeout { action }
            | ExecutorError::Decode { action, .. }
            | ExecutorError::RateLimited { action, .. }
            | ExecutorError::Server { action, .. }
            | ExecutorError::Client { action, .. }
            | ExecutorError::Network { action, .. } => Some(action),
            ExecutorError::InvalidInput(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutorError::RateLimited { .. } => true,
            ExecutorError::Timeout { .. } => true,
            ExecutorError::Network { .. } => true,
            ExecutorError::Server { .. } => true,
            ExecutorError::Client { .. } => false,
            ExecutorError::Decode { .. } => false,
            ExecutorError::InvalidInput(_) => false,
        }
    }
}
