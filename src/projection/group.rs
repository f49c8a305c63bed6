//! Event-group builder: one handler per initiating event kind.

use log::{debug, trace};

use super::mapping::{WORKFLOW_DEFINITION_ACTIVITY, is_utility_activity, split_action_key};
use crate::domain::{
    DslRunArgs, EventGroup, EventInput, InteractionInput, RunActionInput, WorkflowDefinitionInput,
};
use crate::error::{FlowlogError, Result};
use crate::history::payload::decode_first;
use crate::history::{EventAttributes, EventKind, HistoryEvent, PayloadFetcher};
use crate::id::short_workflow_id;

pub(crate) fn expect_kind(event: &HistoryEvent, expected: EventKind) -> Result<()> {
    if event.event_type != expected {
        return Err(FlowlogError::WrongEventKind {
            expected,
            actual: event.event_type,
        });
    }
    Ok(())
}

/// Build the group for any initiating event; other kinds yield `None`
pub async fn build(event: &HistoryEvent, fetcher: &dyn PayloadFetcher) -> Result<Option<EventGroup>> {
    match event.event_type {
        EventKind::ActivityTaskScheduled => from_scheduled_activity(event, fetcher).await,
        EventKind::StartChildWorkflowExecutionInitiated => {
            from_initiated_child_workflow(event, fetcher).await.map(Some)
        }
        EventKind::WorkflowExecutionUpdateAccepted => from_accepted_update(event, fetcher).await.map(Some),
        _ => Ok(None),
    }
}

/// Group for a scheduled activity; `None` for utility activities
pub async fn from_scheduled_activity(
    event: &HistoryEvent,
    fetcher: &dyn PayloadFetcher,
) -> Result<Option<EventGroup>> {
    expect_kind(event, EventKind::ActivityTaskScheduled)?;
    let EventAttributes::ActivityTaskScheduled(attrs) = &event.attributes else {
        return Err(FlowlogError::malformed(event.event_id, "missing activity scheduled attributes"));
    };

    let activity_type = attrs.activity_type.as_str();
    if is_utility_activity(activity_type) {
        trace!("Skipping utility activity {} ({})", activity_type, event.event_id);
        return Ok(None);
    }

    let (task, input) = if activity_type == WORKFLOW_DEFINITION_ACTIVITY {
        let input: WorkflowDefinitionInput = decode_first(&attrs.input, fetcher, event.event_id, "input").await?;
        (input.task.clone(), EventInput::WorkflowDefinition(input))
    } else {
        let input: RunActionInput = decode_first(&attrs.input, fetcher, event.event_id, "input").await?;
        (input.task.clone(), EventInput::RunAction(input))
    };

    let Some(task) = task else {
        debug!("Activity {} carries no task, treating as utility", event.event_id);
        return Ok(None);
    };

    let (namespace, name) = split_action_key(&task.action);
    Ok(Some(EventGroup {
        event_id: event.event_id,
        namespace,
        name,
        key: task.action,
        action_id: task.id,
        action_ref: Some(task.action_ref),
        title: task.title,
        description: task.description,
        input,
        result: None,
        current_attempt: None,
        retry_policy: task.retry_policy,
        start_delay: task.start_delay.max(0.0),
        join_strategy: task.join_strategy,
        related_execution_id: None,
    }))
}

/// Group for a child workflow initiation
pub async fn from_initiated_child_workflow(
    event: &HistoryEvent,
    fetcher: &dyn PayloadFetcher,
) -> Result<EventGroup> {
    expect_kind(event, EventKind::StartChildWorkflowExecutionInitiated)?;
    let EventAttributes::StartChildWorkflowExecutionInitiated(attrs) = &event.attributes else {
        return Err(FlowlogError::malformed(event.event_id, "missing child workflow initiated attributes"));
    };

    let args: DslRunArgs = decode_first(&attrs.input, fetcher, event.event_id, "input").await?;
    let (title, description) = match &args.dsl {
        Some(dsl) => (dsl.title.clone(), dsl.description.clone()),
        None => (None, None),
    };
    let action_id = short_workflow_id(&args.wf_id).unwrap_or_else(|| args.wf_id.clone());

    let mut group = EventGroup::new(event.event_id, "core.workflow", "execute", EventInput::ChildWorkflow(args));
    group.action_id = Some(action_id);
    group.title = title;
    group.description = description;
    group.related_execution_id = Some(attrs.workflow_id.clone());
    Ok(group)
}

/// Group for an accepted interaction update
pub async fn from_accepted_update(event: &HistoryEvent, fetcher: &dyn PayloadFetcher) -> Result<EventGroup> {
    expect_kind(event, EventKind::WorkflowExecutionUpdateAccepted)?;
    let EventAttributes::WorkflowExecutionUpdateAccepted(attrs) = &event.attributes else {
        return Err(FlowlogError::malformed(event.event_id, "missing update accepted attributes"));
    };

    let input: InteractionInput =
        decode_first(&attrs.accepted_request.input.args, fetcher, event.event_id, "update args").await?;
    let group = EventGroup::new(event.event_id, "core.interact", "response", EventInput::Interaction(input));
    debug!("Workflow update accepted: event {} -> {}", event.event_id, group.key);
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JoinStrategy;
    use crate::history::{
        ActivityTaskScheduledAttributes, InlineOnly, ParentClosePolicy, Payloads,
        StartChildWorkflowInitiatedAttributes, UpdateAcceptedAttributes, UpdateInput, UpdateRequest,
    };
    use chrono::{DateTime, Utc};
    use serde_json::{Value, json};

    fn ts() -> DateTime<Utc> {
        "2025-01-01T00:00:00Z".parse().unwrap()
    }

    fn scheduled(event_id: u64, activity_type: &str, input: Value) -> HistoryEvent {
        HistoryEvent::new(
            event_id,
            ts(),
            EventAttributes::ActivityTaskScheduled(ActivityTaskScheduledAttributes {
                activity_id: event_id.to_string(),
                activity_type: activity_type.to_string(),
                input: Payloads::json(input),
            }),
        )
    }

    #[tokio::test]
    async fn test_scheduled_activity_group() {
        let event = scheduled(
            5,
            "run_action_activity",
            json!({
                "task": {
                    "id": "act-1",
                    "ref": "reshape_alerts",
                    "action": "core.transform.reshape",
                    "args": {"value": 1},
                    "title": "Reshape",
                    "start_delay": 2.5,
                    "join_strategy": "any",
                    "retry_policy": {"max_attempts": 4, "timeout": 60}
                },
                "stream_id": "scatter:1"
            }),
        );
        let group = from_scheduled_activity(&event, &InlineOnly).await.unwrap().unwrap();
        assert_eq!(group.event_id, 5);
        assert_eq!(group.namespace, "core.transform");
        assert_eq!(group.name, "reshape");
        assert_eq!(group.key, "core.transform.reshape");
        assert_eq!(group.action_id.as_deref(), Some("act-1"));
        assert_eq!(group.action_ref.as_deref(), Some("reshape_alerts"));
        assert_eq!(group.title.as_deref(), Some("Reshape"));
        assert_eq!(group.start_delay, 2.5);
        assert_eq!(group.join_strategy, JoinStrategy::Any);
        assert_eq!(group.retry_policy.max_attempts, 4);
        assert!(group.related_execution_id.is_none());
        assert!(matches!(group.input, EventInput::RunAction(_)));
    }

    #[tokio::test]
    async fn test_utility_activity_yields_none() {
        let event = scheduled(5, "validate_action_activity", json!({}));
        assert!(from_scheduled_activity(&event, &InlineOnly).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activity_without_task_yields_none() {
        let event = scheduled(5, "run_action_activity", json!({"task": null}));
        assert!(from_scheduled_activity(&event, &InlineOnly).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_workflow_definition_activity() {
        let event = scheduled(
            6,
            WORKFLOW_DEFINITION_ACTIVITY,
            json!({
                "workflow_id": "wf-1",
                "task": {"ref": "run_child", "action": "core.workflow.execute"}
            }),
        );
        let group = from_scheduled_activity(&event, &InlineOnly).await.unwrap().unwrap();
        assert_eq!(group.key, "core.workflow.execute");
        assert!(matches!(group.input, EventInput::WorkflowDefinition(_)));
    }

    #[tokio::test]
    async fn test_wrong_kind_is_rejected() {
        let event = HistoryEvent::bare(5, ts(), EventKind::ActivityTaskCompleted);
        let err = from_scheduled_activity(&event, &InlineOnly).await.unwrap_err();
        assert!(matches!(
            err,
            FlowlogError::WrongEventKind {
                expected: EventKind::ActivityTaskScheduled,
                actual: EventKind::ActivityTaskCompleted
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_input_is_malformed() {
        let event = HistoryEvent::new(
            5,
            ts(),
            EventAttributes::ActivityTaskScheduled(ActivityTaskScheduledAttributes {
                activity_id: "5".to_string(),
                activity_type: "run_action_activity".to_string(),
                input: Payloads::default(),
            }),
        );
        let err = from_scheduled_activity(&event, &InlineOnly).await.unwrap_err();
        assert!(matches!(err, FlowlogError::MalformedEvent { event_id: 5, .. }));
    }

    #[tokio::test]
    async fn test_child_workflow_group() {
        let event = HistoryEvent::new(
            8,
            ts(),
            EventAttributes::StartChildWorkflowExecutionInitiated(StartChildWorkflowInitiatedAttributes {
                workflow_id: "wf-child/exec-1".to_string(),
                input: Payloads::json(json!({
                    "wf_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                    "dsl": {"title": "Enrich", "description": "Enrich an alert"},
                    "trigger_inputs": {"alert": 1}
                })),
                parent_close_policy: ParentClosePolicy::Terminate,
                memo: None,
            }),
        );
        let group = from_initiated_child_workflow(&event, &InlineOnly).await.unwrap();
        assert_eq!(group.namespace, "core.workflow");
        assert_eq!(group.name, "execute");
        assert_eq!(group.key, "core.workflow.execute");
        assert_eq!(group.action_id.as_deref(), Some("wf-67e5504410b1426f9247bb680e5fe0c8"));
        assert_eq!(group.title.as_deref(), Some("Enrich"));
        assert_eq!(group.description.as_deref(), Some("Enrich an alert"));
        assert_eq!(group.related_execution_id.as_deref(), Some("wf-child/exec-1"));
        assert!(group.action_ref.is_none());
    }

    #[tokio::test]
    async fn test_accepted_update_group() {
        let event = HistoryEvent::new(
            11,
            ts(),
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
        let group = build(&event, &InlineOnly).await.unwrap().unwrap();
        assert_eq!(group.key, "core.interact.response");
        assert_eq!(group.retry_policy, Default::default());
        assert!(group.related_execution_id.is_none());
    }

    #[tokio::test]
    async fn test_build_ignores_other_kinds() {
        let event = HistoryEvent::bare(2, ts(), EventKind::WorkflowTaskStarted);
        assert!(build(&event, &InlineOnly).await.unwrap().is_none());
    }
}
