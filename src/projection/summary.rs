//! Execution-level metadata folded from the history.

use crate::domain::{ExecutionStatus, ExecutionSummary};
use crate::history::{EventAttributes, EventKind, HistoryEvent};

/// Status an execution ends in when its history closes with `kind`
fn close_status(kind: EventKind) -> Option<ExecutionStatus> {
    let status = match kind {
        EventKind::WorkflowExecutionCompleted => ExecutionStatus::Completed,
        EventKind::WorkflowExecutionFailed => ExecutionStatus::Failed,
        EventKind::WorkflowExecutionCanceled => ExecutionStatus::Canceled,
        EventKind::WorkflowExecutionTerminated => ExecutionStatus::Terminated,
        EventKind::WorkflowExecutionContinuedAsNew => ExecutionStatus::ContinuedAsNew,
        EventKind::WorkflowExecutionTimedOut => ExecutionStatus::TimedOut,
        _ => return None,
    };
    Some(status)
}

/// Summarize one execution's history
pub fn summarize(execution_id: &str, history: &[HistoryEvent]) -> ExecutionSummary {
    let mut summary = ExecutionSummary {
        id: execution_id.to_string(),
        run_id: None,
        start_time: None,
        close_time: None,
        status: ExecutionStatus::Running,
        workflow_type: None,
        task_queue: None,
        history_length: history.len(),
        parent_execution_id: None,
    };

    for event in history {
        if event.event_type == EventKind::WorkflowExecutionStarted && summary.start_time.is_none() {
            summary.start_time = Some(event.event_time);
            if let EventAttributes::WorkflowExecutionStarted(attrs) = &event.attributes {
                summary.workflow_type = Some(attrs.workflow_type.clone()).filter(|s| !s.is_empty());
                summary.task_queue = Some(attrs.task_queue.clone()).filter(|s| !s.is_empty());
                summary.run_id = attrs.original_execution_run_id.clone();
                summary.parent_execution_id = attrs
                    .parent_workflow_execution
                    .as_ref()
                    .map(|parent| parent.workflow_id.clone());
            }
        } else if let Some(status) = close_status(event.event_type) {
            summary.status = status;
            summary.close_time = Some(event.event_time);
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ExecutionRef, WorkflowExecutionStartedAttributes};
    use chrono::{DateTime, Duration, Utc};

    fn ts(offset: i64) -> DateTime<Utc> {
        "2025-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap() + Duration::seconds(offset)
    }

    fn started() -> HistoryEvent {
        HistoryEvent::new(
            1,
            ts(0),
            EventAttributes::WorkflowExecutionStarted(WorkflowExecutionStartedAttributes {
                workflow_type: "DSLWorkflow".to_string(),
                task_queue: "flowlog-task-queue".to_string(),
                parent_workflow_execution: Some(ExecutionRef {
                    workflow_id: "wf-parent/exec-1".to_string(),
                    run_id: Some("run-0".to_string()),
                }),
                original_execution_run_id: Some("run-1".to_string()),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_running_execution() {
        let history = vec![started(), HistoryEvent::bare(2, ts(1), EventKind::WorkflowTaskScheduled)];
        let summary = summarize("wf-1/exec-1", &history);
        assert_eq!(summary.status, ExecutionStatus::Running);
        assert_eq!(summary.start_time, Some(ts(0)));
        assert!(summary.close_time.is_none());
        assert_eq!(summary.history_length, 2);
        assert_eq!(summary.workflow_type.as_deref(), Some("DSLWorkflow"));
        assert_eq!(summary.task_queue.as_deref(), Some("flowlog-task-queue"));
        assert_eq!(summary.run_id.as_deref(), Some("run-1"));
        assert_eq!(summary.parent_execution_id.as_deref(), Some("wf-parent/exec-1"));
    }

    #[test]
    fn test_closed_execution() {
        let history = vec![started(), HistoryEvent::bare(9, ts(30), EventKind::WorkflowExecutionFailed)];
        let summary = summarize("wf-1/exec-1", &history);
        assert_eq!(summary.status, ExecutionStatus::Failed);
        assert_eq!(summary.close_time, Some(ts(30)));
    }

    #[test]
    fn test_empty_history() {
        let summary = summarize("wf-1/exec-1", &[]);
        assert_eq!(summary.history_length, 0);
        assert!(summary.start_time.is_none());
        assert_eq!(summary.status, ExecutionStatus::Running);
    }
}
