//! Identifier utilities for workflows and executions
//!
//! Workflow ids are UUIDs rendered in short form: `wf-{32 hex}`.
//! Execution ids are `{workflow_id}/exec-{suffix}`.

use uuid::Uuid;

/// Prefix of short-form workflow ids
pub const WORKFLOW_ID_PREFIX: &str = "wf-";

/// Separator between the workflow id and the execution suffix
pub const EXECUTION_SEPARATOR: &str = "/exec-";

/// Normalize a workflow id to its short form
///
/// Accepts a hyphenated or simple UUID, or an id already in short form.
/// Example: `"9a8b...-..."` -> `"wf-9a8b..."`
pub fn short_workflow_id(raw: &str) -> Option<String> {
    let hex = raw.strip_prefix(WORKFLOW_ID_PREFIX).unwrap_or(raw);
    let uuid = Uuid::parse_str(hex).ok()?;
    Some(format!("{}{}", WORKFLOW_ID_PREFIX, uuid.simple()))
}

/// Split an execution id into its workflow id and execution suffix
///
/// Example: `"wf-abc/exec-123"` -> `("wf-abc", "123")`
pub fn parse_execution_id(execution_id: &str) -> Option<(&str, &str)> {
    let (workflow_id, suffix) = execution_id.split_once(EXECUTION_SEPARATOR)?;
    if workflow_id.is_empty() || suffix.is_empty() {
        return None;
    }
    Some((workflow_id, suffix))
}

/// Generate a fresh execution id for a workflow
///
/// Format: `{workflow_id}/exec-{32 hex}`
pub fn generate_execution_id(workflow_id: &str) -> String {
    format!("{}{}{}", workflow_id, EXECUTION_SEPARATOR, Uuid::new_v4().simple())
}
