//! Derived views over an execution history
//!
//! - failure: uniform `(message, cause)` extraction
//! - group: event groups for initiating events
//! - timeline: one entry per recognized event
//! - compact: one row per logical action
//! - summary: execution-level metadata
//! - view: read models combining the above with interactions

pub mod compact;
pub mod failure;
pub mod group;
pub mod mapping;
pub mod summary;
pub mod timeline;
pub mod view;

pub use crate::history::DegradedEvent;
pub use compact::{CompactProjector, project};
pub use summary::summarize;
pub use timeline::{TimelineAssembler, assemble};
pub use view::{ExecutionView, InteractionStore, NoInteractions};

