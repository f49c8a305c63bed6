//! History sources: where an execution's ordered event list comes from.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::DegradedEvent;
use super::event::HistoryEvent;
use crate::error::{FlowlogError, Result};

/// Supplies the full ordered history of one execution
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Events sorted by ascending `event_id`
    async fn fetch_history(&self, execution_id: &str) -> Result<Vec<HistoryEvent>>;
}

/// Check that event ids are strictly increasing.
pub fn ensure_ordered(events: &[HistoryEvent]) -> Result<()> {
    for pair in events.windows(2) {
        if pair[1].event_id <= pair[0].event_id {
            return Err(FlowlogError::OutOfOrder {
                event_id: pair[1].event_id,
                previous: pair[0].event_id,
            });
        }
    }
    Ok(())
}

/// Decode one JSONL line, or describe why it was skipped
///
/// The event id is recovered from the raw JSON when possible, either at the
/// top level or under `event`.
pub(crate) fn decode_line<T: DeserializeOwned>(line_no: usize, line: &str) -> std::result::Result<T, DegradedEvent> {
    serde_json::from_str(line).map_err(|e| {
        let event_id = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|raw| {
                raw.get("event_id")
                    .or_else(|| raw.pointer("/event/event_id"))
                    .and_then(Value::as_u64)
            })
            .unwrap_or(0);
        warn!("Skipping undecodable history line {}: {}", line_no, e);
        DegradedEvent {
            event_id,
            reason: format!("line {}: {}", line_no, e),
        }
    })
}

/// In-memory histories keyed by execution id
#[derive(Debug, Default)]
pub struct MemoryHistory {
    executions: RwLock<HashMap<String, Vec<HistoryEvent>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a history, rejecting out-of-order event lists
    pub fn insert(&self, execution_id: impl Into<String>, events: Vec<HistoryEvent>) -> Result<()> {
        ensure_ordered(&events)?;
        let mut executions = self
            .executions
            .write()
            .map_err(|e| FlowlogError::Storage(e.to_string()))?;
        executions.insert(execution_id.into(), events);
        Ok(())
    }
}

#[async_trait]
impl HistorySource for MemoryHistory {
    async fn fetch_history(&self, execution_id: &str) -> Result<Vec<HistoryEvent>> {
        let executions = self
            .executions
            .read()
            .map_err(|e| FlowlogError::Storage(e.to_string()))?;
        executions
            .get(execution_id)
            .cloned()
            .ok_or_else(|| FlowlogError::ExecutionNotFound(execution_id.to_string()))
    }
}

/// A single execution's history exported as JSONL, one event per line
#[derive(Debug, Clone)]
pub struct JsonlHistoryFile {
    path: PathBuf,
}

impl JsonlHistoryFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read every decodable event; undecodable lines are skipped and reported
    pub fn read(&self) -> Result<HistoryRead> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut read = HistoryRead::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match decode_line::<HistoryEvent>(index + 1, &line) {
                Ok(event) => read.events.push(event),
                Err(skipped) => read.skipped.push(skipped),
            }
        }
        ensure_ordered(&read.events)?;
        debug!(
            "Read {} events from {} ({} skipped)",
            read.events.len(),
            self.path.display(),
            read.skipped.len()
        );
        Ok(read)
    }

    /// Decodable events only
    pub fn read_events(&self) -> Result<Vec<HistoryEvent>> {
        Ok(self.read()?.events)
    }
}

/// Result of reading a JSONL history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryRead {
    pub events: Vec<HistoryEvent>,
    pub skipped: Vec<DegradedEvent>,
}

#[async_trait]
impl HistorySource for JsonlHistoryFile {
    /// The file holds one execution, so the id is not consulted.
    async fn fetch_history(&self, _execution_id: &str) -> Result<Vec<HistoryEvent>> {
        self.read_events()
    }
}
