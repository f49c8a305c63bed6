//! Timeline assembler.
//!
//! Walks the history once, in order. Initiating events produce a group that is
//! remembered by event id; later start/close events of the same action are
//! tagged with that group. Events tied to a utility action never had a group
//! and are left out of the timeline, as are engine-internal kinds.

use std::collections::HashMap;

use futures::stream::{self, Stream};
use log::{debug, warn};
use serde_json::Value;

use super::DegradedEvent;
use super::{failure, group, mapping};
use crate::domain::{EventGroup, Role, WorkflowExecutionEvent};
use crate::error::Result;
use crate::history::payload::first_payload;
use crate::history::{EventAttributes, EventKind, HistoryEvent, PayloadFetcher, Payloads};

/// Incremental timeline fold
pub struct TimelineAssembler<'a> {
    fetcher: &'a dyn PayloadFetcher,
    groups: HashMap<u64, EventGroup>,
    degraded: Vec<DegradedEvent>,
}

impl<'a> TimelineAssembler<'a> {
    pub fn new(fetcher: &'a dyn PayloadFetcher) -> Self {
        Self {
            fetcher,
            groups: HashMap::new(),
            degraded: Vec::new(),
        }
    }

    /// Feed the next event; returns its timeline entry if it has one
    ///
    /// A derivation failure is logged and recorded in `degraded()`; the event is
    /// omitted and the fold stays usable.
    pub async fn apply(&mut self, event: &HistoryEvent) -> Option<WorkflowExecutionEvent> {
        match self.derive(event).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Omitting event {} from timeline: {}", event.event_id, e);
                self.degraded.push(DegradedEvent {
                    event_id: event.event_id,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    pub fn degraded(&self) -> &[DegradedEvent] {
        &self.degraded
    }

    async fn derive(&mut self, event: &HistoryEvent) -> Result<Option<WorkflowExecutionEvent>> {
        let Some(event_type) = mapping::presentation_type(event.event_type) else {
            return Ok(None);
        };

        let mut entry = WorkflowExecutionEvent {
            event_id: event.event_id,
            event_time: event.event_time,
            event_type,
            task_id: event.task_id,
            event_group: None,
            failure: None,
            result: None,
            role: None,
            parent_execution_id: None,
            execution_timeout: None,
        };

        if event.event_type.is_initiating() {
            let Some(group) = group::build(event, self.fetcher).await? else {
                return Ok(None);
            };
            self.groups.insert(event.event_id, group.clone());
            entry.event_group = Some(group);
        } else if let Some(source_id) = event.source_event_id() {
            let Some(group) = self.groups.get(&source_id) else {
                debug!("Event {} relates to ungrouped event {}, omitting", event.event_id, source_id);
                return Ok(None);
            };
            let mut group = group.clone();
            if let EventAttributes::ActivityTaskStarted(a) = &event.attributes {
                group.current_attempt = Some(a.attempt);
            }
            entry.event_group = Some(group);
        }

        if let EventAttributes::WorkflowExecutionStarted(attrs) = &event.attributes {
            entry.role = self.run_role(event.event_id, &attrs.input).await;
            entry.parent_execution_id = attrs
                .parent_workflow_execution
                .as_ref()
                .map(|parent| parent.workflow_id.clone());
            entry.execution_timeout = attrs.workflow_execution_timeout;
        }

        entry.result = self.result_of(event).await?;
        if let (Some(result), Some(group)) = (&entry.result, entry.event_group.as_mut()) {
            group.result = Some(result.clone());
        }

        if failure::carries_failure(event) {
            entry.failure = Some(failure::extract(event)?);
        }

        Ok(Some(entry))
    }

    /// Role from the run input; any other input shape leaves it unset
    async fn run_role(&self, event_id: u64, input: &Payloads) -> Option<Role> {
        let value = match first_payload(input, self.fetcher).await {
            Ok(value) => value?,
            Err(e) => {
                warn!("Event {} run input unavailable: {}", event_id, e);
                return None;
            }
        };
        let role = value.get("role").filter(|role| !role.is_null())?;
        match serde_json::from_value(role.clone()) {
            Ok(role) => Some(role),
            Err(e) => {
                warn!("Event {} run input has an unreadable role: {}", event_id, e);
                None
            }
        }
    }

    async fn result_of(&self, event: &HistoryEvent) -> Result<Option<Value>> {
        let payloads = match (&event.event_type, &event.attributes) {
            (EventKind::ActivityTaskCompleted, EventAttributes::ActivityTaskCompleted(a)) => &a.result,
            (EventKind::ChildWorkflowExecutionCompleted, EventAttributes::ChildWorkflowExecutionCompleted(a)) => {
                &a.result
            }
            (EventKind::WorkflowExecutionCompleted, EventAttributes::WorkflowExecutionCompleted(a)) => &a.result,
            (EventKind::WorkflowExecutionUpdateCompleted, EventAttributes::WorkflowExecutionUpdateCompleted(a)) => {
                match &a.outcome.success {
                    Some(success) => success,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };
        first_payload(payloads, self.fetcher).await
    }
}

/// Assemble the full timeline of a history
pub async fn assemble(history: &[HistoryEvent], fetcher: &dyn PayloadFetcher) -> Vec<WorkflowExecutionEvent> {
    let mut assembler = TimelineAssembler::new(fetcher);
    let mut events = Vec::new();
    for event in history {
        if let Some(entry) = assembler.apply(event).await {
            events.push(entry);
        }
    }
    if !assembler.degraded().is_empty() {
        warn!("Timeline omitted {} degraded events", assembler.degraded().len());
    }
    events
}

/// Lazily yield timeline entries in history order
pub fn stream<'a>(
    history: &'a [HistoryEvent],
    fetcher: &'a dyn PayloadFetcher,
) -> impl Stream<Item = WorkflowExecutionEvent> + 'a {
    let state = (TimelineAssembler::new(fetcher), history.iter());
    stream::unfold(state, |(mut assembler, mut events)| async move {
        for event in events.by_ref() {
            if let Some(entry) = assembler.apply(event).await {
                return Some((entry, (assembler, events)));
            }
        }
        None
    })
}
