//! Derived execution views: timeline events, compact rows, and read models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{Role, StreamId};
use super::enums::{EventStatus, ExecutionStatus, WaitStrategy, WorkflowEventType};
use super::group::{EventFailure, EventGroup};
use crate::error::{FlowlogError, Result};

/// One timeline entry per recognized history event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionEvent {
    pub event_id: u64,
    pub event_time: DateTime<Utc>,
    pub event_type: WorkflowEventType,
    pub task_id: u64,
    pub event_group: Option<EventGroup>,
    pub failure: Option<EventFailure>,
    pub result: Option<Value>,
    pub role: Option<Role>,
    pub parent_execution_id: Option<String>,
    /// Seconds
    pub execution_timeout: Option<f64>,
}

/// One row per logical action, keyed by the initiating event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionEventCompact<I, R> {
    pub source_event_id: u64,
    pub schedule_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub curr_event_type: WorkflowEventType,
    pub status: EventStatus,
    pub action_name: String,
    pub action_ref: String,
    pub action_input: Option<I>,
    pub action_result: Option<R>,
    pub action_error: Option<EventFailure>,
    pub stream_id: StreamId,
    pub child_execution_id: Option<String>,
    pub child_execution_count: u32,
    pub loop_index: Option<u64>,
    pub child_wait_strategy: Option<WaitStrategy>,
}

impl<I, R> WorkflowExecutionEventCompact<I, R> {
    /// A freshly initiated row
    pub fn initiated(
        source_event_id: u64,
        schedule_time: DateTime<Utc>,
        curr_event_type: WorkflowEventType,
        status: EventStatus,
        action_name: impl Into<String>,
        action_ref: impl Into<String>,
    ) -> Self {
        Self {
            source_event_id,
            schedule_time,
            start_time: None,
            close_time: None,
            curr_event_type,
            status,
            action_name: action_name.into(),
            action_ref: action_ref.into(),
            action_input: None,
            action_result: None,
            action_error: None,
            stream_id: StreamId::root(),
            child_execution_id: None,
            child_execution_count: 0,
            loop_index: None,
            child_wait_strategy: None,
        }
    }

    /// Move to `next`, rejecting anything that is not forward
    pub fn transition(&mut self, next: EventStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(FlowlogError::InvalidTransition {
                source_event_id: self.source_event_id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn is_child_workflow(&self) -> bool {
        self.child_execution_id.is_some()
    }
}

/// Execution-level metadata derived from the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub id: String,
    pub run_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub workflow_type: Option<String>,
    pub task_queue: Option<String>,
    pub history_length: usize,
    pub parent_execution_id: Option<String>,
}

/// State of a human-in-the-loop interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionStatus {
    Idle,
    Pending,
    Error,
    Timed,
    Completed,
}

/// Interaction record fetched from the interaction store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRead {
    pub id: String,
    pub execution_id: String,
    pub action_ref: String,
    pub status: InteractionStatus,
    #[serde(default)]
    pub request_payload: Option<Value>,
    #[serde(default)]
    pub response_payload: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full timeline view of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionRead {
    #[serde(flatten)]
    pub summary: ExecutionSummary,
    pub events: Vec<WorkflowExecutionEvent>,
    pub interactions: Vec<InteractionRead>,
}

/// Compact view of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionReadCompact<I, R> {
    #[serde(flatten)]
    pub summary: ExecutionSummary,
    pub events: Vec<WorkflowExecutionEventCompact<I, R>>,
    pub interactions: Vec<InteractionRead>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: EventStatus) -> WorkflowExecutionEventCompact<Value, Value> {
        WorkflowExecutionEventCompact::initiated(
            1,
            "2025-01-01T00:00:00Z".parse().unwrap(),
            WorkflowEventType::ActivityTaskScheduled,
            status,
            "core.http_request",
            "fetch",
        )
    }

    #[test]
    fn test_initiated_defaults() {
        let row = row(EventStatus::Scheduled);
        assert!(row.stream_id.is_root());
        assert_eq!(row.child_execution_count, 0);
        assert!(!row.is_child_workflow());
    }

    #[test]
    fn test_transition_forward() {
        let mut row = row(EventStatus::Scheduled);
        row.transition(EventStatus::Started).unwrap();
        row.transition(EventStatus::Completed).unwrap();
        assert_eq!(row.status, EventStatus::Completed);
    }

    #[test]
    fn test_transition_backward_rejected() {
        let mut row = row(EventStatus::Completed);
        let err = row.transition(EventStatus::Scheduled).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid transition for source event 1: COMPLETED -> SCHEDULED"
        );
        assert_eq!(row.status, EventStatus::Completed);
    }

    #[test]
    fn test_detached_rejects_updates() {
        let mut row = row(EventStatus::Detached);
        assert!(row.transition(EventStatus::Started).is_err());
        assert!(row.transition(EventStatus::Completed).is_err());
    }

    #[test]
    fn test_read_flattens_summary() {
        let read = WorkflowExecutionRead {
            summary: ExecutionSummary {
                id: "wf-1/exec-1".to_string(),
                run_id: None,
                start_time: None,
                close_time: None,
                status: ExecutionStatus::Running,
                workflow_type: None,
                task_queue: None,
                history_length: 0,
                parent_execution_id: None,
            },
            events: vec![],
            interactions: vec![],
        };
        let value = serde_json::to_value(&read).unwrap();
        assert_eq!(value["id"], "wf-1/exec-1");
        assert_eq!(value["status"], "RUNNING");
        assert!(value["events"].as_array().unwrap().is_empty());
    }
}
