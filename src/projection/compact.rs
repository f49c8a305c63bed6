//! Compact projector: one row per logical action.
//!
//! Rows are created by initiating events and keyed by the initiating event id.
//! Later start/close events look the row up through their back-reference and
//! advance it along the forward-only status machine. A rejected update or a
//! failed payload fetch affects that event only.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::{trace, warn};
use serde_json::Value;

use super::DegradedEvent;
use super::mapping::{CHILD_WORKFLOW_EXECUTE, WORKFLOW_DEFINITION_ACTIVITY, presentation_type};
use super::{failure, group};
use crate::domain::{
    ChildWorkflowMemo, CompactEvent, EventFailure, EventInput, EventStatus, StreamId, WaitStrategy,
    WorkflowEventType,
};
use crate::error::{FlowlogError, Result};
use crate::history::payload::first_payload;
use crate::history::{EventAttributes, EventKind, HistoryEvent, ParentClosePolicy, PayloadFetcher};

/// What a start/close event does to its row
struct RowUpdate {
    status: EventStatus,
    start_time: Option<DateTime<Utc>>,
    close_time: Option<DateTime<Utc>>,
    result: Option<Value>,
    error: Option<EventFailure>,
}

impl RowUpdate {
    fn started(at: DateTime<Utc>) -> Self {
        Self {
            status: EventStatus::Started,
            start_time: Some(at),
            close_time: None,
            result: None,
            error: None,
        }
    }

    fn closed(status: EventStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            start_time: None,
            close_time: Some(at),
            result: None,
            error: None,
        }
    }
}

/// Incremental compact-row fold
pub struct CompactProjector<'a> {
    fetcher: &'a dyn PayloadFetcher,
    rows: BTreeMap<u64, CompactEvent>,
    degraded: Vec<DegradedEvent>,
}

impl<'a> CompactProjector<'a> {
    pub fn new(fetcher: &'a dyn PayloadFetcher) -> Self {
        Self {
            fetcher,
            rows: BTreeMap::new(),
            degraded: Vec::new(),
        }
    }

    /// Feed the next event
    ///
    /// Failures are logged and recorded in `degraded()`; rows already built stay
    /// as they were.
    pub async fn apply(&mut self, event: &HistoryEvent) {
        if let Err(e) = self.try_apply(event).await {
            warn!("Compact projection skipped event {}: {}", event.event_id, e);
            self.degraded.push(DegradedEvent {
                event_id: event.event_id,
                reason: e.to_string(),
            });
        }
    }

    /// Feed the next event, surfacing the failure instead of recording it
    pub async fn try_apply(&mut self, event: &HistoryEvent) -> Result<()> {
        match event.event_type {
            EventKind::ActivityTaskScheduled => self.create_activity_row(event).await,
            EventKind::StartChildWorkflowExecutionInitiated => self.create_child_row(event).await,
            EventKind::WorkflowExecutionUpdateAccepted => self.create_update_row(event).await,
            EventKind::ActivityTaskStarted
            | EventKind::ActivityTaskCompleted
            | EventKind::ActivityTaskFailed
            | EventKind::ActivityTaskTimedOut
            | EventKind::ActivityTaskCanceled
            | EventKind::ChildWorkflowExecutionStarted
            | EventKind::ChildWorkflowExecutionCompleted
            | EventKind::ChildWorkflowExecutionFailed
            | EventKind::ChildWorkflowExecutionCanceled
            | EventKind::ChildWorkflowExecutionTerminated
            | EventKind::ChildWorkflowExecutionTimedOut
            | EventKind::WorkflowExecutionUpdateCompleted => self.update_row(event).await,
            _ => Ok(()),
        }
    }

    /// Current rows ordered by source event id
    pub fn rows(&self) -> Vec<CompactEvent> {
        let mut fan_out: HashMap<(String, StreamId), u32> = HashMap::new();
        for row in self.rows.values().filter(|r| r.is_child_workflow()) {
            *fan_out.entry((row.action_ref.clone(), row.stream_id.clone())).or_insert(0) += 1;
        }
        self.rows
            .values()
            .cloned()
            .map(|mut row| {
                if row.is_child_workflow() {
                    row.child_execution_count = fan_out
                        .get(&(row.action_ref.clone(), row.stream_id.clone()))
                        .copied()
                        .unwrap_or(0);
                }
                row
            })
            .collect()
    }

    pub fn degraded(&self) -> &[DegradedEvent] {
        &self.degraded
    }

    async fn create_activity_row(&mut self, event: &HistoryEvent) -> Result<()> {
        if let EventAttributes::ActivityTaskScheduled(attrs) = &event.attributes {
            if attrs.activity_type == WORKFLOW_DEFINITION_ACTIVITY {
                trace!("Skipping workflow definition lookup {}", event.event_id);
                return Ok(());
            }
        }
        let Some(group) = group::from_scheduled_activity(event, self.fetcher).await? else {
            return Ok(());
        };
        let (stream_id, action_input) = match &group.input {
            EventInput::RunAction(input) => (
                input.stream_id.clone(),
                input.task.as_ref().map(|task| task.args.clone()),
            ),
            _ => (StreamId::root(), None),
        };

        let mut row = CompactEvent::initiated(
            event.event_id,
            event.event_time,
            WorkflowEventType::ActivityTaskScheduled,
            EventStatus::Scheduled,
            group.key,
            group.action_ref.unwrap_or_default(),
        );
        row.action_input = action_input;
        row.stream_id = stream_id;
        self.insert(row);
        Ok(())
    }

    async fn create_child_row(&mut self, event: &HistoryEvent) -> Result<()> {
        let group = group::from_initiated_child_workflow(event, self.fetcher).await?;
        let EventAttributes::StartChildWorkflowExecutionInitiated(attrs) = &event.attributes else {
            return Err(FlowlogError::malformed(event.event_id, "missing child workflow initiated attributes"));
        };
        let Some(memo) = &attrs.memo else {
            return Err(FlowlogError::malformed(event.event_id, "child workflow initiation has no memo"));
        };
        let memo = ChildWorkflowMemo::from_memo(memo, self.fetcher, event.event_id).await?;

        let detached =
            attrs.parent_close_policy == ParentClosePolicy::Abandon && memo.wait_strategy == WaitStrategy::Detach;
        let status = if detached {
            EventStatus::Detached
        } else {
            EventStatus::Scheduled
        };

        let mut row = CompactEvent::initiated(
            event.event_id,
            event.event_time,
            WorkflowEventType::StartChildWorkflowExecutionInitiated,
            status,
            CHILD_WORKFLOW_EXECUTE,
            memo.action_ref,
        );
        if let EventInput::ChildWorkflow(args) = group.input {
            row.action_input = args.trigger_inputs;
        }
        row.child_execution_id = Some(attrs.workflow_id.clone());
        row.loop_index = memo.loop_index;
        row.child_wait_strategy = Some(memo.wait_strategy);
        row.stream_id = memo.stream_id;
        self.insert(row);
        Ok(())
    }

    async fn create_update_row(&mut self, event: &HistoryEvent) -> Result<()> {
        let group = group::from_accepted_update(event, self.fetcher).await?;
        let EventInput::Interaction(input) = group.input else {
            return Err(FlowlogError::malformed(event.event_id, "update carries no interaction input"));
        };
        let mut row = CompactEvent::initiated(
            event.event_id,
            event.event_time,
            WorkflowEventType::WorkflowExecutionUpdateAccepted,
            EventStatus::Scheduled,
            input.action_ref.clone(),
            input.action_ref.clone(),
        );
        row.action_input = Some(serde_json::to_value(&input)?);
        self.insert(row);
        Ok(())
    }

    fn insert(&mut self, row: CompactEvent) {
        trace!("Compact row {} created as {}", row.source_event_id, row.status);
        self.rows.insert(row.source_event_id, row);
    }

    async fn update_row(&mut self, event: &HistoryEvent) -> Result<()> {
        let source_id = event
            .source_event_id()
            .ok_or_else(|| FlowlogError::malformed(event.event_id, "missing reference to initiating event"))?;
        if !self.rows.contains_key(&source_id) {
            trace!("Event {} refers to unknown row {}, ignoring", event.event_id, source_id);
            return Ok(());
        }

        // Fetch before touching the row so a failed fetch leaves it intact
        let update = self.describe_update(event).await?;
        let Some(curr_event_type) = presentation_type(event.event_type) else {
            return Ok(());
        };
        let Some(row) = self.rows.get_mut(&source_id) else {
            return Ok(());
        };

        if row.status == EventStatus::Started && update.status == EventStatus::Started {
            return Ok(());
        }
        row.transition(update.status)?;
        row.curr_event_type = curr_event_type;
        if update.start_time.is_some() {
            row.start_time = update.start_time;
        }
        if update.close_time.is_some() {
            row.close_time = update.close_time;
        }
        if update.result.is_some() {
            row.action_result = update.result;
        }
        if update.error.is_some() {
            row.action_error = update.error;
        }
        Ok(())
    }

    async fn describe_update(&self, event: &HistoryEvent) -> Result<RowUpdate> {
        let at = event.event_time;
        let update = match (event.event_type, &event.attributes) {
            (EventKind::ActivityTaskStarted, _) | (EventKind::ChildWorkflowExecutionStarted, _) => {
                RowUpdate::started(at)
            }
            (EventKind::ActivityTaskCompleted, EventAttributes::ActivityTaskCompleted(a)) => RowUpdate {
                result: first_payload(&a.result, self.fetcher).await?,
                ..RowUpdate::closed(EventStatus::Completed, at)
            },
            (EventKind::ChildWorkflowExecutionCompleted, EventAttributes::ChildWorkflowExecutionCompleted(a)) => {
                RowUpdate {
                    result: first_payload(&a.result, self.fetcher).await?,
                    ..RowUpdate::closed(EventStatus::Completed, at)
                }
            }
            (EventKind::ActivityTaskFailed, _) | (EventKind::ChildWorkflowExecutionFailed, _) => RowUpdate {
                error: Some(failure::extract(event)?),
                ..RowUpdate::closed(EventStatus::Failed, at)
            },
            (EventKind::ActivityTaskTimedOut, _) => RowUpdate {
                error: Some(failure::extract(event)?),
                ..RowUpdate::closed(EventStatus::TimedOut, at)
            },
            (EventKind::ActivityTaskCanceled, _) | (EventKind::ChildWorkflowExecutionCanceled, _) => {
                RowUpdate::closed(EventStatus::Canceled, at)
            }
            (EventKind::ChildWorkflowExecutionTerminated, _) => RowUpdate::closed(EventStatus::Terminated, at),
            (EventKind::ChildWorkflowExecutionTimedOut, _) => RowUpdate::closed(EventStatus::TimedOut, at),
            (EventKind::WorkflowExecutionUpdateCompleted, EventAttributes::WorkflowExecutionUpdateCompleted(a)) => {
                if a.outcome.failure.is_some() {
                    RowUpdate {
                        error: Some(failure::extract(event)?),
                        ..RowUpdate::closed(EventStatus::Failed, at)
                    }
                } else {
                    let result = match &a.outcome.success {
                        Some(success) => first_payload(success, self.fetcher).await?,
                        None => None,
                    };
                    RowUpdate {
                        result,
                        ..RowUpdate::closed(EventStatus::Completed, at)
                    }
                }
            }
            (kind, _) => {
                return Err(FlowlogError::malformed(
                    event.event_id,
                    format!("{:?} has unexpected attributes", kind),
                ));
            }
        };
        Ok(update)
    }
}

/// Project a full history into compact rows
pub async fn project(history: &[HistoryEvent], fetcher: &dyn PayloadFetcher) -> Vec<CompactEvent> {
    let mut projector = CompactProjector::new(fetcher);
    for event in history {
        projector.apply(event).await;
    }
    if !projector.degraded().is_empty() {
        warn!("Compact projection degraded on {} events", projector.degraded().len());
    }
    projector.rows()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{
        ActivityTaskCompletedAttributes, ActivityTaskFailedAttributes, ActivityTaskScheduledAttributes,
        ActivityTaskStartedAttributes, ChildWorkflowClosedAttributes, ChildWorkflowStartedAttributes, Failure,
        InlineOnly, Memo, Payload, Payloads, StartChildWorkflowInitiatedAttributes, UpdateAcceptedAttributes,
        UpdateCompletedAttributes, UpdateInput, UpdateOutcome, UpdateRequest,
    };
    use chrono::Duration;
    use serde_json::json;

    fn ts(offset: i64) -> DateTime<Utc> {
        "2025-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap() + Duration::seconds(offset)
    }

    fn scheduled(id: u64, action: &str, stream: &str) -> HistoryEvent {
        HistoryEvent::new(
            id,
            ts(id as i64),
            EventAttributes::ActivityTaskScheduled(ActivityTaskScheduledAttributes {
                activity_id: id.to_string(),
                activity_type: "run_action_activity".to_string(),
                input: Payloads::json(json!({
                    "task": {"ref": format!("step_{}", id), "action": action, "args": {"n": id}},
                    "stream_id": stream
                })),
            }),
        )
    }

    fn activity_started(id: u64, scheduled_id: u64) -> HistoryEvent {
        HistoryEvent::new(
            id,
            ts(id as i64),
            EventAttributes::ActivityTaskStarted(ActivityTaskStartedAttributes {
                scheduled_event_id: scheduled_id,
                attempt: 1,
            }),
        )
    }

    fn activity_completed(id: u64, scheduled_id: u64) -> HistoryEvent {
        HistoryEvent::new(
            id,
            ts(id as i64),
            EventAttributes::ActivityTaskCompleted(ActivityTaskCompletedAttributes {
                scheduled_event_id: scheduled_id,
                result: Payloads::json(json!({"status": 200})),
            }),
        )
    }

    fn child(id: u64, policy: ParentClosePolicy, wait: &str, loop_index: u64) -> HistoryEvent {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("action_ref".to_string(), Payload::inline(json!("run_children")));
        fields.insert("wait_strategy".to_string(), Payload::inline(json!(wait)));
        fields.insert("loop_index".to_string(), Payload::inline(json!(loop_index)));
        HistoryEvent::new(
            id,
            ts(id as i64),
            EventAttributes::StartChildWorkflowExecutionInitiated(StartChildWorkflowInitiatedAttributes {
                workflow_id: format!("wf-child/exec-{}", id),
                input: Payloads::json(json!({"wf_id": "wf-child", "trigger_inputs": {"i": loop_index}})),
                parent_close_policy: policy,
                memo: Some(Memo { fields }),
            }),
        )
    }

    #[tokio::test]
    async fn test_scheduled_then_completed() {
        let history = vec![
            scheduled(5, "core.http_request", "<root>:0"),
            activity_started(6, 5),
            activity_completed(7, 5),
        ];
        let rows = project(&history, &InlineOnly).await;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.source_event_id, 5);
        assert_eq!(row.status, EventStatus::Completed);
        assert_eq!(row.curr_event_type, WorkflowEventType::ActivityTaskCompleted);
        assert_eq!(row.action_name, "core.http_request");
        assert_eq!(row.action_ref, "step_5");
        assert_eq!(row.action_input, Some(json!({"n": 5})));
        assert_eq!(row.action_result, Some(json!({"status": 200})));
        assert_eq!(row.schedule_time, ts(5));
        assert_eq!(row.start_time, Some(ts(6)));
        assert_eq!(row.close_time, Some(ts(7)));
    }

    #[tokio::test]
    async fn test_rows_follow_initiation_order() {
        let history = vec![
            scheduled(5, "core.a", "<root>:0"),
            scheduled(6, "core.b", "scatter:1"),
            scheduled(9, "core.c", "scatter:2"),
        ];
        let rows = project(&history, &InlineOnly).await;
        let ids: Vec<u64> = rows.iter().map(|r| r.source_event_id).collect();
        assert_eq!(ids, vec![5, 6, 9]);
        assert!(rows.iter().all(|r| r.status == EventStatus::Scheduled));
        assert_eq!(rows[1].stream_id, StreamId::from("scatter:1"));
    }

    #[tokio::test]
    async fn test_activity_failed_sets_error() {
        let failed = HistoryEvent::new(
            7,
            ts(7),
            EventAttributes::ActivityTaskFailed(ActivityTaskFailedAttributes {
                scheduled_event_id: 5,
                failure: Failure::new("boom"),
            }),
        );
        let rows = project(&[scheduled(5, "core.a", "<root>:0"), failed], &InlineOnly).await;
        assert_eq!(rows[0].status, EventStatus::Failed);
        let error = rows[0].action_error.as_ref().unwrap();
        assert_eq!(error.message, "boom");
        assert!(error.cause.is_none());
    }

    #[tokio::test]
    async fn test_started_twice_is_noop() {
        let mut projector = CompactProjector::new(&InlineOnly);
        projector.apply(&scheduled(5, "core.a", "<root>:0")).await;
        projector.try_apply(&activity_started(6, 5)).await.unwrap();
        projector.try_apply(&activity_started(7, 5)).await.unwrap();
        let rows = projector.rows();
        assert_eq!(rows[0].status, EventStatus::Started);
        assert_eq!(rows[0].start_time, Some(ts(6)));
        assert!(projector.degraded().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_transition_keeps_row() {
        let mut projector = CompactProjector::new(&InlineOnly);
        projector.apply(&scheduled(5, "core.a", "<root>:0")).await;
        projector.apply(&activity_completed(6, 5)).await;
        let before = projector.rows();

        let err = projector.try_apply(&activity_started(7, 5)).await.unwrap_err();
        assert!(matches!(err, FlowlogError::InvalidTransition { source_event_id: 5, .. }));
        assert_eq!(projector.rows(), before);
    }

    #[tokio::test]
    async fn test_unknown_source_is_ignored() {
        let mut projector = CompactProjector::new(&InlineOnly);
        projector.apply(&activity_completed(6, 99)).await;
        assert!(projector.rows().is_empty());
        assert!(projector.degraded().is_empty());
    }

    #[tokio::test]
    async fn test_utility_and_definition_lookup_excluded() {
        let utility = HistoryEvent::new(
            5,
            ts(5),
            EventAttributes::ActivityTaskScheduled(ActivityTaskScheduledAttributes {
                activity_id: "5".to_string(),
                activity_type: "evaluate_single_expression_activity".to_string(),
                input: Payloads::json(json!({})),
            }),
        );
        let lookup = HistoryEvent::new(
            6,
            ts(6),
            EventAttributes::ActivityTaskScheduled(ActivityTaskScheduledAttributes {
                activity_id: "6".to_string(),
                activity_type: WORKFLOW_DEFINITION_ACTIVITY.to_string(),
                input: Payloads::json(json!({
                    "workflow_id": "wf-1",
                    "task": {"ref": "run_child", "action": "core.workflow.execute"}
                })),
            }),
        );
        assert!(project(&[utility, lookup], &InlineOnly).await.is_empty());
    }

    #[tokio::test]
    async fn test_detached_child() {
        let history = vec![
            child(8, ParentClosePolicy::Abandon, "detach", 0),
            HistoryEvent::new(
                9,
                ts(9),
                EventAttributes::ChildWorkflowExecutionStarted(ChildWorkflowStartedAttributes {
                    initiated_event_id: 8,
                    workflow_execution: None,
                }),
            ),
        ];
        let mut projector = CompactProjector::new(&InlineOnly);
        for event in &history {
            projector.apply(event).await;
        }
        let rows = projector.rows();
        assert_eq!(rows[0].status, EventStatus::Detached);
        assert_eq!(rows[0].child_wait_strategy, Some(WaitStrategy::Detach));
        assert_eq!(rows[0].start_time, None);
        assert_eq!(projector.degraded().len(), 1);
    }

    #[tokio::test]
    async fn test_abandon_with_wait_is_scheduled() {
        let rows = project(&[child(8, ParentClosePolicy::Abandon, "wait", 0)], &InlineOnly).await;
        assert_eq!(rows[0].status, EventStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_child_fan_out_counted() {
        let history = vec![
            child(8, ParentClosePolicy::Terminate, "wait", 0),
            child(9, ParentClosePolicy::Terminate, "wait", 1),
            child(10, ParentClosePolicy::Terminate, "wait", 2),
            scheduled(11, "core.a", "<root>:0"),
        ];
        let rows = project(&history, &InlineOnly).await;
        assert_eq!(rows.len(), 4);
        for row in &rows[..3] {
            assert_eq!(row.action_name, CHILD_WORKFLOW_EXECUTE);
            assert_eq!(row.action_ref, "run_children");
            assert_eq!(row.child_execution_count, 3);
        }
        assert_eq!(rows[1].loop_index, Some(1));
        assert_eq!(rows[1].action_input, Some(json!({"i": 1})));
        assert_eq!(rows[1].child_execution_id.as_deref(), Some("wf-child/exec-9"));
        assert_eq!(rows[3].child_execution_count, 0);
    }

    #[tokio::test]
    async fn test_child_terminated() {
        let mut terminated = HistoryEvent::new(
            9,
            ts(9),
            EventAttributes::ChildWorkflowExecutionClosed(ChildWorkflowClosedAttributes { initiated_event_id: 8 }),
        );
        terminated.event_type = EventKind::ChildWorkflowExecutionTerminated;
        let rows = project(&[child(8, ParentClosePolicy::Terminate, "wait", 0), terminated], &InlineOnly).await;
        assert_eq!(rows[0].status, EventStatus::Terminated);
        assert_eq!(rows[0].curr_event_type, WorkflowEventType::ChildWorkflowExecutionTerminated);
        assert_eq!(rows[0].close_time, Some(ts(9)));
    }

    #[tokio::test]
    async fn test_update_round_trip() {
        let accepted = HistoryEvent::new(
            11,
            ts(11),
            EventAttributes::WorkflowExecutionUpdateAccepted(UpdateAcceptedAttributes {
                protocol_instance_id: "p-1".to_string(),
                accepted_request: UpdateRequest {
                    input: UpdateInput {
                        name: "interaction_handler".to_string(),
                        args: Payloads::json(json!({
                            "interaction_id": "int-1",
                            "execution_id": "wf-1/exec-1",
                            "action_ref": "ask_analyst",
                            "data": {"approved": true}
                        })),
                    },
                },
            }),
        );
        let completed = HistoryEvent::new(
            12,
            ts(12),
            EventAttributes::WorkflowExecutionUpdateCompleted(UpdateCompletedAttributes {
                accepted_event_id: 11,
                outcome: UpdateOutcome {
                    success: Some(Payloads::json(json!({"ok": true}))),
                    failure: None,
                },
            }),
        );
        let rows = project(&[accepted, completed], &InlineOnly).await;
        let row = &rows[0];
        assert_eq!(row.action_name, "ask_analyst");
        assert_eq!(row.action_ref, "ask_analyst");
        assert_eq!(row.action_input.as_ref().unwrap()["data"], json!({"approved": true}));
        assert_eq!(row.status, EventStatus::Completed);
        assert_eq!(row.action_result, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_only_that_event() {
        let broken_completion = HistoryEvent::new(
            7,
            ts(7),
            EventAttributes::ActivityTaskCompleted(ActivityTaskCompletedAttributes {
                scheduled_event_id: 5,
                result: Payloads::external("missing"),
            }),
        );
        let mut projector = CompactProjector::new(&InlineOnly);
        projector.apply(&scheduled(5, "core.a", "<root>:0")).await;
        projector.apply(&activity_started(6, 5)).await;
        projector.apply(&broken_completion).await;
        projector.apply(&scheduled(8, "core.b", "<root>:0")).await;

        let rows = projector.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, EventStatus::Started);
        assert_eq!(projector.degraded()[0].event_id, 7);
    }

    #[tokio::test]
    async fn test_projection_is_idempotent() {
        let history = vec![
            scheduled(5, "core.a", "<root>:0"),
            activity_started(6, 5),
            activity_completed(7, 5),
            child(8, ParentClosePolicy::Terminate, "wait", 0),
        ];
        let first = project(&history, &InlineOnly).await;
        let second = project(&history, &InlineOnly).await;
        assert_eq!(first, second);
    }
}
