//! Fixed tables: engine kind to presentation type, and the utility denylist.

use crate::domain::WorkflowEventType;
use crate::history::EventKind;

/// Action key reported for child-workflow rows
pub const CHILD_WORKFLOW_EXECUTE: &str = "core.workflow.execute";

/// Activity that loads a child workflow's definition
pub const WORKFLOW_DEFINITION_ACTIVITY: &str = "get_workflow_definition_activity";

/// Bookkeeping activities that never surface in either view
pub const UTILITY_ACTIONS: &[&str] = &[
    "get_schedule_activity",
    "validate_trigger_inputs_activity",
    "validate_action_activity",
    "parse_wait_until_activity",
    "evaluate_single_expression_activity",
    "evaluate_templated_object_activity",
    "resolve_time_anchor_activity",
    "noop_gather_action_activity",
];

pub fn is_utility_activity(activity_type: &str) -> bool {
    UTILITY_ACTIONS.contains(&activity_type)
}

/// Presentation type for an engine kind; `None` means the kind is not shown
pub fn presentation_type(kind: EventKind) -> Option<WorkflowEventType> {
    use WorkflowEventType as T;
    let mapped = match kind {
        EventKind::WorkflowExecutionStarted => T::WorkflowExecutionStarted,
        EventKind::WorkflowExecutionCompleted => T::WorkflowExecutionCompleted,
        EventKind::WorkflowExecutionFailed => T::WorkflowExecutionFailed,
        EventKind::WorkflowExecutionTerminated => T::WorkflowExecutionTerminated,
        EventKind::WorkflowExecutionCanceled => T::WorkflowExecutionCanceled,
        EventKind::WorkflowExecutionContinuedAsNew => T::WorkflowExecutionContinuedAsNew,
        EventKind::WorkflowExecutionTimedOut => T::WorkflowExecutionTimedOut,
        EventKind::WorkflowExecutionSignaled => T::WorkflowExecutionSignaled,
        EventKind::ActivityTaskScheduled => T::ActivityTaskScheduled,
        EventKind::ActivityTaskStarted => T::ActivityTaskStarted,
        EventKind::ActivityTaskCompleted => T::ActivityTaskCompleted,
        EventKind::ActivityTaskFailed => T::ActivityTaskFailed,
        EventKind::ActivityTaskTimedOut => T::ActivityTaskTimedOut,
        EventKind::ActivityTaskCanceled => T::ActivityTaskCanceled,
        EventKind::StartChildWorkflowExecutionInitiated => T::StartChildWorkflowExecutionInitiated,
        EventKind::ChildWorkflowExecutionStarted => T::ChildWorkflowExecutionStarted,
        EventKind::ChildWorkflowExecutionCompleted => T::ChildWorkflowExecutionCompleted,
        EventKind::ChildWorkflowExecutionFailed => T::ChildWorkflowExecutionFailed,
        EventKind::ChildWorkflowExecutionCanceled => T::ChildWorkflowExecutionCanceled,
        EventKind::ChildWorkflowExecutionTerminated => T::ChildWorkflowExecutionTerminated,
        EventKind::ChildWorkflowExecutionTimedOut => T::ChildWorkflowExecutionTimedOut,
        EventKind::WorkflowExecutionUpdateAccepted => T::WorkflowExecutionUpdateAccepted,
        EventKind::WorkflowExecutionUpdateRejected => T::WorkflowExecutionUpdateRejected,
        EventKind::WorkflowExecutionUpdateCompleted => T::WorkflowExecutionUpdateCompleted,
        EventKind::WorkflowTaskScheduled
        | EventKind::WorkflowTaskStarted
        | EventKind::WorkflowTaskCompleted
        | EventKind::WorkflowTaskFailed
        | EventKind::ActivityTaskCancelRequested
        | EventKind::TimerStarted
        | EventKind::TimerFired
        | EventKind::MarkerRecorded
        | EventKind::Other => return None,
    };
    Some(mapped)
}

/// Split a fully qualified action key on its last `.`
///
/// `"core.transform.reshape"` -> `("core.transform", "reshape")`.
/// A key without a dot has an empty namespace.
pub fn split_action_key(key: &str) -> (String, String) {
    match key.rsplit_once('.') {
        Some((namespace, name)) => (namespace.to_string(), name.to_string()),
        None => (String::new(), key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_nested_namespace() {
        assert_eq!(
            split_action_key("core.transform.reshape"),
            ("core.transform".to_string(), "reshape".to_string())
        );
    }

    #[test]
    fn test_split_single_level() {
        assert_eq!(
            split_action_key("core.http_request"),
            ("core".to_string(), "http_request".to_string())
        );
    }

    #[test]
    fn test_split_without_namespace() {
        assert_eq!(split_action_key("reshape"), (String::new(), "reshape".to_string()));
    }

    #[test]
    fn test_utility_denylist() {
        assert!(is_utility_activity("validate_action_activity"));
        assert!(!is_utility_activity("run_action_activity"));
        assert!(!is_utility_activity(WORKFLOW_DEFINITION_ACTIVITY));
    }

    #[test]
    fn test_internal_kinds_are_not_shown() {
        assert!(presentation_type(EventKind::WorkflowTaskCompleted).is_none());
        assert!(presentation_type(EventKind::TimerFired).is_none());
        assert!(presentation_type(EventKind::Other).is_none());
    }

    #[test]
    fn test_initiating_kinds_are_shown() {
        assert_eq!(
            presentation_type(EventKind::ActivityTaskScheduled),
            Some(WorkflowEventType::ActivityTaskScheduled)
        );
        assert_eq!(
            presentation_type(EventKind::WorkflowExecutionUpdateAccepted),
            Some(WorkflowEventType::WorkflowExecutionUpdateAccepted)
        );
    }
}
