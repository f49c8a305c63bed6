//! Error types for flowlog
//!
//! Centralized error handling using thiserror. Collaborator boundaries
//! (executor, sandbox) carry their own error enums.

use thiserror::Error;

use crate::history::EventKind;

/// All error types that can occur while deriving views from history
#[derive(Debug, Error)]
pub enum FlowlogError {
    /// A kind-specific handler was handed an event of another kind (caller bug)
    #[error("Wrong event kind: expected {expected:?}, got {actual:?}")]
    WrongEventKind { expected: EventKind, actual: EventKind },

    /// No handler exists for this event kind (caller bug)
    #[error("Unsupported event kind for {operation}: {kind:?}")]
    UnsupportedEventKind { operation: &'static str, kind: EventKind },

    /// A recognized event is missing a required field or submessage
    #[error("Malformed event {event_id}: {reason}")]
    MalformedEvent { event_id: u64, reason: String },

    /// An externally stored payload could not be retrieved
    #[error("Payload fetch failed for {key}: {reason}")]
    PayloadFetch { key: String, reason: String },

    /// A payload was retrieved but did not match the expected shape
    #[error("Payload decode failed: {0}")]
    PayloadDecode(String),

    /// A compact row update would move its status backwards
    #[error("Invalid transition for source event {source_event_id}: {from} -> {to}")]
    InvalidTransition {
        source_event_id: u64,
        from: String,
        to: String,
    },

    /// History events arrived out of sequence order
    #[error("Out of order event: {event_id} does not follow {previous}")]
    OutOfOrder { event_id: u64, previous: u64 },

    /// No history exists for the execution
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// External collaborator (interaction store, etc.) failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl FlowlogError {
    /// Create a malformed-event error
    pub fn malformed(event_id: u64, reason: impl Into<String>) -> Self {
        FlowlogError::MalformedEvent {
            event_id,
            reason: reason.into(),
        }
    }

    /// True for errors that mean the caller used an API incorrectly
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            FlowlogError::WrongEventKind { .. } | FlowlogError::UnsupportedEventKind { .. }
        )
    }
}

/// Result type alias for flowlog operations
pub type Result<T> = std::result::Result<T, FlowlogError>;
