//! Event groups: the logical action an initiating event starts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{
    ActionRetryPolicy, DslRunArgs, InteractionInput, RunActionInput, WorkflowDefinitionInput,
};
use super::enums::JoinStrategy;
use crate::history::Failure;

/// Input payload of a group, by action kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventInput {
    ChildWorkflow(DslRunArgs),
    WorkflowDefinition(WorkflowDefinitionInput),
    Interaction(InteractionInput),
    RunAction(RunActionInput),
}

/// One logical action invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGroup {
    /// Id of the initiating history event
    pub event_id: u64,
    pub namespace: String,
    pub name: String,
    /// `namespace.name`
    pub key: String,
    pub action_id: Option<String>,
    pub action_ref: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub input: EventInput,
    pub result: Option<Value>,
    pub current_attempt: Option<u32>,
    pub retry_policy: ActionRetryPolicy,
    /// Seconds
    pub start_delay: f64,
    pub join_strategy: JoinStrategy,
    pub related_execution_id: Option<String>,
}

impl EventGroup {
    /// A group with defaults for everything but identity and input
    pub fn new(event_id: u64, namespace: &str, name: &str, input: EventInput) -> Self {
        Self {
            event_id,
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: format!("{}.{}", namespace, name),
            action_id: None,
            action_ref: None,
            title: None,
            description: None,
            input,
            result: None,
            current_attempt: None,
            retry_policy: ActionRetryPolicy::default(),
            start_delay: 0.0,
            join_strategy: JoinStrategy::default(),
            related_execution_id: None,
        }
    }
}

/// Uniform failure information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFailure {
    pub message: String,
    pub cause: Option<Failure>,
}
