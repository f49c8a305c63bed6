//! Failure normalization.
//!
//! Each failure-carrying kind has exactly one path to its failure payload.
//! Asking for the failure of any other kind is a caller bug.

use crate::domain::EventFailure;
use crate::error::{FlowlogError, Result};
use crate::history::{EventAttributes, EventKind, Failure, HistoryEvent};

/// Whether `extract` may be called for this event
pub fn carries_failure(event: &HistoryEvent) -> bool {
    match event.event_type {
        EventKind::ActivityTaskFailed
        | EventKind::ActivityTaskTimedOut
        | EventKind::WorkflowExecutionFailed
        | EventKind::ChildWorkflowExecutionFailed => true,
        EventKind::WorkflowExecutionUpdateCompleted => matches!(
            &event.attributes,
            EventAttributes::WorkflowExecutionUpdateCompleted(a) if a.outcome.failure.is_some()
        ),
        _ => false,
    }
}

/// Extract `(message, cause)` from a failure-carrying event
pub fn extract(event: &HistoryEvent) -> Result<EventFailure> {
    let failure = failure_of(event)?;
    Ok(EventFailure {
        message: failure.message.clone(),
        cause: failure.cause.as_deref().cloned(),
    })
}

fn failure_of(event: &HistoryEvent) -> Result<&Failure> {
    let missing = || FlowlogError::malformed(event.event_id, format!("{:?} has no failure attributes", event.event_type));
    match (event.event_type, &event.attributes) {
        (EventKind::ActivityTaskFailed, EventAttributes::ActivityTaskFailed(a)) => Ok(&a.failure),
        (EventKind::ActivityTaskTimedOut, EventAttributes::ActivityTaskTimedOut(a)) => Ok(&a.failure),
        (EventKind::WorkflowExecutionFailed, EventAttributes::WorkflowExecutionFailed(a)) => Ok(&a.failure),
        (EventKind::ChildWorkflowExecutionFailed, EventAttributes::ChildWorkflowExecutionFailed(a)) => {
            Ok(&a.failure)
        }
        (EventKind::WorkflowExecutionUpdateCompleted, EventAttributes::WorkflowExecutionUpdateCompleted(a)) => {
            a.outcome.failure.as_ref().ok_or_else(|| {
                FlowlogError::malformed(event.event_id, "update outcome carries no failure")
            })
        }
        (
            EventKind::ActivityTaskFailed
            | EventKind::ActivityTaskTimedOut
            | EventKind::WorkflowExecutionFailed
            | EventKind::ChildWorkflowExecutionFailed
            | EventKind::WorkflowExecutionUpdateCompleted,
            _,
        ) => Err(missing()),
        (kind, _) => Err(FlowlogError::UnsupportedEventKind {
            operation: "failure extraction",
            kind,
        }),
    }
}
