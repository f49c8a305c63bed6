//! History event types as delivered by the durable execution engine.
//!
//! Events are immutable. `event_type` names the engine kind; `attributes` holds
//! the kind-specific payload. Attribute payloads that fail to parse, or belong to
//! kinds we do not model, are kept verbatim as `EventAttributes::Unrecognized`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::payload::{Payload, Payloads};

/// Engine-level event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    WorkflowExecutionCanceled,
    WorkflowExecutionTerminated,
    WorkflowExecutionTimedOut,
    WorkflowExecutionContinuedAsNew,
    WorkflowExecutionSignaled,
    WorkflowTaskScheduled,
    WorkflowTaskStarted,
    WorkflowTaskCompleted,
    WorkflowTaskFailed,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCancelRequested,
    ActivityTaskCanceled,
    StartChildWorkflowExecutionInitiated,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
    ChildWorkflowExecutionCanceled,
    ChildWorkflowExecutionTerminated,
    ChildWorkflowExecutionTimedOut,
    WorkflowExecutionUpdateAccepted,
    WorkflowExecutionUpdateRejected,
    WorkflowExecutionUpdateCompleted,
    TimerStarted,
    TimerFired,
    MarkerRecorded,
    /// Any kind this crate does not know about
    #[serde(other)]
    Other,
}

impl EventKind {
    /// Kinds that start a logical action and may produce an event group
    pub fn is_initiating(&self) -> bool {
        matches!(
            self,
            EventKind::ActivityTaskScheduled
                | EventKind::StartChildWorkflowExecutionInitiated
                | EventKind::WorkflowExecutionUpdateAccepted
        )
    }
}

/// One immutable, sequence-numbered history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Sequence number, strictly increasing within an execution
    pub event_id: u64,
    pub event_time: DateTime<Utc>,
    pub event_type: EventKind,
    #[serde(default)]
    pub task_id: u64,
    #[serde(default)]
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    /// Build an event whose kind is taken from its attributes
    pub fn new(event_id: u64, event_time: DateTime<Utc>, attributes: EventAttributes) -> Self {
        Self {
            event_id,
            event_time,
            event_type: attributes.kind().unwrap_or(EventKind::Other),
            task_id: 0,
            attributes,
        }
    }

    /// Build an event of the given kind carrying no attributes
    pub fn bare(event_id: u64, event_time: DateTime<Utc>, event_type: EventKind) -> Self {
        Self {
            event_id,
            event_time,
            event_type,
            task_id: 0,
            attributes: EventAttributes::default(),
        }
    }

    /// Id of the initiating event this event refers back to, if any
    pub fn source_event_id(&self) -> Option<u64> {
        match &self.attributes {
            EventAttributes::ActivityTaskStarted(a) => Some(a.scheduled_event_id),
            EventAttributes::ActivityTaskCompleted(a) => Some(a.scheduled_event_id),
            EventAttributes::ActivityTaskFailed(a) => Some(a.scheduled_event_id),
            EventAttributes::ActivityTaskTimedOut(a) => Some(a.scheduled_event_id),
            EventAttributes::ActivityTaskCanceled(a) => Some(a.scheduled_event_id),
            EventAttributes::ChildWorkflowExecutionStarted(a) => Some(a.initiated_event_id),
            EventAttributes::ChildWorkflowExecutionCompleted(a) => Some(a.initiated_event_id),
            EventAttributes::ChildWorkflowExecutionFailed(a) => Some(a.initiated_event_id),
            EventAttributes::ChildWorkflowExecutionClosed(a) => Some(a.initiated_event_id),
            EventAttributes::WorkflowExecutionUpdateCompleted(a) => Some(a.accepted_event_id),
            _ => None,
        }
    }
}

/// Kind-specific attribute payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAttributes {
    WorkflowExecutionStarted(WorkflowExecutionStartedAttributes),
    WorkflowExecutionCompleted(WorkflowExecutionCompletedAttributes),
    WorkflowExecutionFailed(FailedAttributes),
    ActivityTaskScheduled(ActivityTaskScheduledAttributes),
    ActivityTaskStarted(ActivityTaskStartedAttributes),
    ActivityTaskCompleted(ActivityTaskCompletedAttributes),
    ActivityTaskFailed(ActivityTaskFailedAttributes),
    ActivityTaskTimedOut(ActivityTaskFailedAttributes),
    ActivityTaskCanceled(ActivityTaskCanceledAttributes),
    StartChildWorkflowExecutionInitiated(StartChildWorkflowInitiatedAttributes),
    ChildWorkflowExecutionStarted(ChildWorkflowStartedAttributes),
    ChildWorkflowExecutionCompleted(ChildWorkflowCompletedAttributes),
    ChildWorkflowExecutionFailed(ChildWorkflowFailedAttributes),
    /// Canceled, terminated and timed-out children share one shape
    ChildWorkflowExecutionClosed(ChildWorkflowClosedAttributes),
    WorkflowExecutionUpdateAccepted(UpdateAcceptedAttributes),
    WorkflowExecutionUpdateCompleted(UpdateCompletedAttributes),
    #[serde(untagged)]
    Unrecognized(Value),
}

impl Default for EventAttributes {
    fn default() -> Self {
        EventAttributes::Unrecognized(Value::Null)
    }
}

impl EventAttributes {
    /// The kind implied by the attribute variant, where it is unambiguous
    pub fn kind(&self) -> Option<EventKind> {
        let kind = match self {
            EventAttributes::WorkflowExecutionStarted(_) => EventKind::WorkflowExecutionStarted,
            EventAttributes::WorkflowExecutionCompleted(_) => EventKind::WorkflowExecutionCompleted,
            EventAttributes::WorkflowExecutionFailed(_) => EventKind::WorkflowExecutionFailed,
            EventAttributes::ActivityTaskScheduled(_) => EventKind::ActivityTaskScheduled,
            EventAttributes::ActivityTaskStarted(_) => EventKind::ActivityTaskStarted,
            EventAttributes::ActivityTaskCompleted(_) => EventKind::ActivityTaskCompleted,
            EventAttributes::ActivityTaskFailed(_) => EventKind::ActivityTaskFailed,
            EventAttributes::ActivityTaskTimedOut(_) => EventKind::ActivityTaskTimedOut,
            EventAttributes::ActivityTaskCanceled(_) => EventKind::ActivityTaskCanceled,
            EventAttributes::StartChildWorkflowExecutionInitiated(_) => {
                EventKind::StartChildWorkflowExecutionInitiated
            }
            EventAttributes::ChildWorkflowExecutionStarted(_) => {
                EventKind::ChildWorkflowExecutionStarted
            }
            EventAttributes::ChildWorkflowExecutionCompleted(_) => {
                EventKind::ChildWorkflowExecutionCompleted
            }
            EventAttributes::ChildWorkflowExecutionFailed(_) => EventKind::ChildWorkflowExecutionFailed,
            EventAttributes::WorkflowExecutionUpdateAccepted(_) => {
                EventKind::WorkflowExecutionUpdateAccepted
            }
            EventAttributes::WorkflowExecutionUpdateCompleted(_) => {
                EventKind::WorkflowExecutionUpdateCompleted
            }
            EventAttributes::ChildWorkflowExecutionClosed(_) | EventAttributes::Unrecognized(_) => {
                return None;
            }
        };
        Some(kind)
    }
}

/// Reference to another workflow execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRef {
    pub workflow_id: String,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Engine-attached key/value metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    #[serde(default)]
    pub fields: BTreeMap<String, Payload>,
}

/// Structured failure tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Failure {
    pub message: String,
    pub source: String,
    pub stack_trace: String,
    pub details: Option<Value>,
    pub cause: Option<Box<Failure>>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Policy applied to a child when its parent closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParentClosePolicy {
    #[default]
    Terminate,
    Abandon,
    RequestCancel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowExecutionStartedAttributes {
    pub workflow_type: String,
    pub task_queue: String,
    pub input: Payloads,
    /// Seconds
    pub workflow_execution_timeout: Option<f64>,
    pub parent_workflow_execution: Option<ExecutionRef>,
    pub original_execution_run_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowExecutionCompletedAttributes {
    pub result: Payloads,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAttributes {
    pub failure: Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskScheduledAttributes {
    #[serde(default)]
    pub activity_id: String,
    pub activity_type: String,
    #[serde(default)]
    pub input: Payloads,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskStartedAttributes {
    pub scheduled_event_id: u64,
    #[serde(default = "default_attempt")]
    pub attempt: u32,
}

fn default_attempt() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCompletedAttributes {
    pub scheduled_event_id: u64,
    #[serde(default)]
    pub result: Payloads,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskFailedAttributes {
    pub scheduled_event_id: u64,
    pub failure: Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCanceledAttributes {
    pub scheduled_event_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowInitiatedAttributes {
    /// Execution id the child will run under
    pub workflow_id: String,
    #[serde(default)]
    pub input: Payloads,
    #[serde(default)]
    pub parent_close_policy: ParentClosePolicy,
    #[serde(default)]
    pub memo: Option<Memo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowStartedAttributes {
    pub initiated_event_id: u64,
    #[serde(default)]
    pub workflow_execution: Option<ExecutionRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowCompletedAttributes {
    pub initiated_event_id: u64,
    #[serde(default)]
    pub result: Payloads,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowFailedAttributes {
    pub initiated_event_id: u64,
    pub failure: Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowClosedAttributes {
    pub initiated_event_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateInput {
    pub name: String,
    pub args: Payloads,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateRequest {
    pub input: UpdateInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAcceptedAttributes {
    #[serde(default)]
    pub protocol_instance_id: String,
    pub accepted_request: UpdateRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOutcome {
    pub success: Option<Payloads>,
    pub failure: Option<Failure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCompletedAttributes {
    pub accepted_event_id: u64,
    #[serde(default)]
    pub outcome: UpdateOutcome,
}
