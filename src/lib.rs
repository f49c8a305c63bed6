//! flowlog - read models over durable workflow execution histories
//!
//! flowlog folds the ordered event history of a workflow execution into
//! presentation views: a timeline with one entry per recognized event, and a
//! compact view with one row per logical action (activity, child workflow or
//! interaction).

pub mod domain;
pub mod error;
pub mod executor;
pub mod history;
pub mod id;
pub mod projection;
pub mod sandbox;
pub mod store;

pub use error::{FlowlogError, Result};
