//! Read models: summary plus timeline or compact rows, plus interactions.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, warn};

use super::{compact, summary, timeline};
use crate::domain::{InteractionRead, WorkflowExecutionRead, WorkflowExecutionReadCompact};
use crate::error::Result;
use crate::history::{HistorySource, PayloadFetcher};

/// Default number of executions projected at once
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 8;

/// Source of human-in-the-loop interaction records
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn list_interactions(&self, execution_id: &str) -> Result<Vec<InteractionRead>>;
}

/// Interaction store for deployments without one
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInteractions;

#[async_trait]
impl InteractionStore for NoInteractions {
    async fn list_interactions(&self, _execution_id: &str) -> Result<Vec<InteractionRead>> {
        Ok(Vec::new())
    }
}

/// Builds read models for executions
pub struct ExecutionView {
    source: Arc<dyn HistorySource>,
    fetcher: Arc<dyn PayloadFetcher>,
    interactions: Arc<dyn InteractionStore>,
    max_concurrent: usize,
}

impl ExecutionView {
    pub fn new(source: Arc<dyn HistorySource>, fetcher: Arc<dyn PayloadFetcher>) -> Self {
        Self {
            source,
            fetcher,
            interactions: Arc::new(NoInteractions),
            max_concurrent: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
        }
    }

    /// Set the interaction store.
    pub fn with_interactions(mut self, interactions: Arc<dyn InteractionStore>) -> Self {
        self.interactions = interactions;
        self
    }

    /// Bound concurrent projections in `read_compact_many`; 0 is treated as 1.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Full timeline view of one execution
    pub async fn read(&self, execution_id: &str) -> Result<WorkflowExecutionRead> {
        let history = self.source.fetch_history(execution_id).await?;
        let events = timeline::assemble(&history, self.fetcher.as_ref()).await;
        Ok(WorkflowExecutionRead {
            summary: summary::summarize(execution_id, &history),
            events,
            interactions: self.interactions_for(execution_id).await,
        })
    }

    /// Compact view of one execution
    pub async fn read_compact(
        &self,
        execution_id: &str,
    ) -> Result<WorkflowExecutionReadCompact<serde_json::Value, serde_json::Value>> {
        let history = self.source.fetch_history(execution_id).await?;
        let events = compact::project(&history, self.fetcher.as_ref()).await;
        Ok(WorkflowExecutionReadCompact {
            summary: summary::summarize(execution_id, &history),
            events,
            interactions: self.interactions_for(execution_id).await,
        })
    }

    /// Compact views of many executions, in the order requested
    pub async fn read_compact_many(
        &self,
        execution_ids: &[String],
    ) -> Vec<(String, Result<WorkflowExecutionReadCompact<serde_json::Value, serde_json::Value>>)> {
        debug!(
            "Projecting {} executions, at most {} at a time",
            execution_ids.len(),
            self.max_concurrent
        );
        stream::iter(execution_ids)
            .map(|id| async move { (id.clone(), self.read_compact(id).await) })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    async fn interactions_for(&self, execution_id: &str) -> Vec<InteractionRead> {
        match self.interactions.list_interactions(execution_id).await {
            Ok(interactions) => interactions,
            Err(e) => {
                warn!("Interaction store failed for {}: {}", execution_id, e);
                Vec::new()
            }
        }
    }
}
