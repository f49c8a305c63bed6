//! Storage layer for flowlog.
//!
//! Imported execution histories are persisted with a dual-storage approach:
//! - **JSONL file**: Append-only log (source of truth)
//! - **SQLite database**: Query index (rebuilt from JSONL)
//!
//! # Example
//!
//! ```ignore
//! use flowlog::store::HistoryStore;
//! use std::path::Path;
//!
//! let store = HistoryStore::open_at(Path::new("/var/lib/flowlog"))?;
//! store.append("wf-1/exec-1", &events)?;
//! let history = store.load("wf-1/exec-1")?;
//! ```

mod history_store;

pub use history_store::{ExecutionEntry, HistoryStore};
