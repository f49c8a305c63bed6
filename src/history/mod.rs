//! Engine history model
//!
//! - event: immutable history events and their kind-specific attributes
//! - payload: payload lists, first-chunk decoding and blob fetching
//! - source: where ordered histories come from

pub mod event;
pub mod payload;
pub mod source;

pub use event::{
    ActivityTaskCanceledAttributes, ActivityTaskCompletedAttributes, ActivityTaskFailedAttributes,
    ActivityTaskScheduledAttributes, ActivityTaskStartedAttributes, ChildWorkflowClosedAttributes,
    ChildWorkflowCompletedAttributes, ChildWorkflowFailedAttributes, ChildWorkflowStartedAttributes,
    EventAttributes, EventKind, ExecutionRef, FailedAttributes, Failure, HistoryEvent, Memo,
    ParentClosePolicy, StartChildWorkflowInitiatedAttributes, UpdateAcceptedAttributes,
    UpdateCompletedAttributes, UpdateInput, UpdateOutcome, UpdateRequest,
    WorkflowExecutionCompletedAttributes, WorkflowExecutionStartedAttributes,
};
pub use payload::{DirectoryFetcher, InlineOnly, Payload, PayloadFetcher, Payloads};
pub use source::{HistoryRead, HistorySource, JsonlHistoryFile, MemoryHistory, ensure_ordered};

use serde::{Deserialize, Serialize};

/// An event left out of a read or a projection, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedEvent {
    /// 0 when the id itself could not be recovered
    pub event_id: u64,
    pub reason: String,
}
