//! Action and workflow payload shapes carried inside history payloads.
//!
//! Only the fields needed to label events are modeled; everything else in the
//! payload is ignored on decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::enums::{JoinStrategy, WaitStrategy};
use crate::error::{FlowlogError, Result};
use crate::history::payload::{PayloadFetcher, resolve};
use crate::history::Memo;

/// Stream an event belongs to when it is not inside a parallel branch or loop
pub const ROOT_STREAM: &str = "<root>:0";

/// Identifier partitioning events of the same parallel or loop branch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl StreamId {
    pub fn root() -> Self {
        StreamId(ROOT_STREAM.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_STREAM
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::root()
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        StreamId(s.to_string())
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Principal an execution runs on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub service_id: String,
}

/// Retry settings attached to an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionRetryPolicy {
    pub max_attempts: u32,
    /// Seconds
    pub timeout: u64,
    pub retry_until: Option<String>,
}

impl Default for ActionRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            timeout: 300,
            retry_until: None,
        }
    }
}

/// One action as written in the workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStatement {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "ref")]
    pub action_ref: String,
    /// Fully qualified action key, e.g. `core.http_request`
    pub action: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub retry_policy: ActionRetryPolicy,
    /// Seconds
    #[serde(default)]
    pub start_delay: f64,
    #[serde(default)]
    pub join_strategy: JoinStrategy,
}

/// Execution context an action runs in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunContext {
    pub wf_id: Option<String>,
    pub wf_exec_id: Option<String>,
    pub wf_run_id: Option<String>,
    pub environment: Option<String>,
}

/// Input of the activity that runs one action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunActionInput {
    pub task: Option<ActionStatement>,
    pub stream_id: StreamId,
    pub role: Option<Role>,
    pub run_context: Option<RunContext>,
}

/// Title and description of an embedded workflow definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DslDefinition {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Arguments a workflow execution is started with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DslRunArgs {
    pub wf_id: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub dsl: Option<DslDefinition>,
    #[serde(default)]
    pub trigger_inputs: Option<Value>,
    #[serde(default)]
    pub parent_run_context: Option<RunContext>,
    /// Seconds
    #[serde(default)]
    pub timeout: Option<f64>,
}

/// Input of the activity that loads a child workflow's definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinitionInput {
    pub workflow_id: String,
    #[serde(default)]
    pub task: Option<ActionStatement>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Payload of a human-in-the-loop response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionInput {
    pub interaction_id: String,
    pub execution_id: String,
    pub action_ref: String,
    #[serde(default)]
    pub data: Value,
}

/// Business context attached by the engine when a child workflow is initiated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowMemo {
    pub action_ref: String,
    #[serde(default)]
    pub loop_index: Option<u64>,
    #[serde(default)]
    pub wait_strategy: WaitStrategy,
    #[serde(default)]
    pub stream_id: StreamId,
}

impl ChildWorkflowMemo {
    /// Decode the memo fields of a child-workflow initiation event
    pub async fn from_memo(memo: &Memo, fetcher: &dyn PayloadFetcher, event_id: u64) -> Result<Self> {
        let mut fields = serde_json::Map::new();
        for (name, payload) in &memo.fields {
            fields.insert(name.clone(), resolve(payload, fetcher).await?);
        }
        if !fields.contains_key("action_ref") {
            return Err(FlowlogError::malformed(event_id, "child workflow memo has no action_ref"));
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| FlowlogError::PayloadDecode(format!("event {} memo: {}", event_id, e)))
    }
}
