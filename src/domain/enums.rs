//! Presentation-level enums shared by the timeline and compact views.

use serde::{Deserialize, Serialize};

/// Event types exposed to the UI, a subset of the engine kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEventType {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    WorkflowExecutionTerminated,
    WorkflowExecutionCanceled,
    WorkflowExecutionContinuedAsNew,
    WorkflowExecutionTimedOut,
    WorkflowExecutionSignaled,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
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
}

/// Status of one logical action in the compact view
///
/// Forward-only: `Scheduled -> (Started) -> closed`. `Detached` is only ever
/// assigned at initiation and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Scheduled,
    Started,
    Completed,
    Failed,
    Canceled,
    Terminated,
    TimedOut,
    Detached,
}

impl EventStatus {
    /// The action finished, one way or another
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            EventStatus::Completed
                | EventStatus::Failed
                | EventStatus::Canceled
                | EventStatus::Terminated
                | EventStatus::TimedOut
        )
    }

    /// No further update is accepted
    pub fn is_terminal(&self) -> bool {
        self.is_closed() || matches!(self, EventStatus::Detached)
    }

    /// Whether a row in this status may move to `next`
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        match self {
            EventStatus::Scheduled => next == EventStatus::Started || next.is_closed(),
            EventStatus::Started => next == EventStatus::Started || next.is_closed(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "SCHEDULED",
            EventStatus::Started => "STARTED",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Failed => "FAILED",
            EventStatus::Canceled => "CANCELED",
            EventStatus::Terminated => "TERMINATED",
            EventStatus::TimedOut => "TIMED_OUT",
            EventStatus::Detached => "DETACHED",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the workflow execution as a whole
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    #[default]
    Running,
    Completed,
    Failed,
    Canceled,
    Terminated,
    ContinuedAsNew,
    TimedOut,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Canceled => "CANCELED",
            ExecutionStatus::Terminated => "TERMINATED",
            ExecutionStatus::ContinuedAsNew => "CONTINUED_AS_NEW",
            ExecutionStatus::TimedOut => "TIMED_OUT",
        }
    }
}

/// Whether a parent waits for a child workflow or detaches from it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    #[default]
    Wait,
    Detach,
}

/// How parallel branches are combined at a merge point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    Any,
    #[default]
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EventStatus; 8] = [
        EventStatus::Scheduled,
        EventStatus::Started,
        EventStatus::Completed,
        EventStatus::Failed,
        EventStatus::Canceled,
        EventStatus::Terminated,
        EventStatus::TimedOut,
        EventStatus::Detached,
    ];

    #[test]
    fn test_scheduled_transitions() {
        let from = EventStatus::Scheduled;
        assert!(from.can_transition_to(EventStatus::Started));
        assert!(from.can_transition_to(EventStatus::Completed));
        assert!(from.can_transition_to(EventStatus::Canceled));
        assert!(!from.can_transition_to(EventStatus::Scheduled));
        assert!(!from.can_transition_to(EventStatus::Detached));
    }

    #[test]
    fn test_started_is_idempotent() {
        assert!(EventStatus::Started.can_transition_to(EventStatus::Started));
        assert!(EventStatus::Started.can_transition_to(EventStatus::Failed));
        assert!(!EventStatus::Started.can_transition_to(EventStatus::Scheduled));
    }

    #[test]
    fn test_terminal_statuses_accept_nothing() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {} must be rejected", from, to);
            }
        }
    }

    #[test]
    fn test_detached_is_terminal_but_not_closed() {
        assert!(EventStatus::Detached.is_terminal());
        assert!(!EventStatus::Detached.is_closed());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&EventStatus::TimedOut).unwrap(),
            "\"TIMED_OUT\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowEventType::StartChildWorkflowExecutionInitiated).unwrap(),
            "\"START_CHILD_WORKFLOW_EXECUTION_INITIATED\""
        );
        assert_eq!(serde_json::to_string(&WaitStrategy::Detach).unwrap(), "\"detach\"");
    }

    #[test]
    fn test_display_matches_serde() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json.trim_matches('"'), status.to_string());
        }
    }
}
