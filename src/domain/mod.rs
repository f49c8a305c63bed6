//! Domain types for flowlog
//!
//! This module contains the value objects derived from history:
//! - enums: presentation event types and status state machines
//! - action: action/workflow payload shapes decoded from history payloads
//! - group: EventGroup (the logical action) and EventFailure
//! - execution: timeline events, compact rows and read views

pub mod action;
pub mod enums;
pub mod execution;
pub mod group;

pub use action::{
    ActionRetryPolicy, ActionStatement, ChildWorkflowMemo, DslDefinition, DslRunArgs,
    InteractionInput, ROOT_STREAM, Role, RunActionInput, RunContext, StreamId,
    WorkflowDefinitionInput,
};
pub use enums::{EventStatus, ExecutionStatus, JoinStrategy, WaitStrategy, WorkflowEventType};
pub use execution::{
    ExecutionSummary, InteractionRead, InteractionStatus, WorkflowExecutionEvent,
    WorkflowExecutionEventCompact, WorkflowExecutionRead, WorkflowExecutionReadCompact,
};
pub use group::{EventFailure, EventGroup, EventInput};

/// Compact row as produced by the projector
pub type CompactEvent = WorkflowExecutionEventCompact<serde_json::Value, serde_json::Value>;
