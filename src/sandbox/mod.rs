//! Namespace-isolated command sandbox
//!
//! - policy: which namespaces may be touched, and kubeconfig validation
//! - pod: pod listing and command execution over the `PodExec` trait

pub mod pod;
pub mod policy;

use std::path::PathBuf;

use thiserror::Error;

pub use pod::{ExecOutput, PodExec, PodExecResult, PodSandbox, PodTarget};
pub use policy::{Kubeconfig, NamespacePolicy};

/// Errors raised by the sandbox boundary
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Operations on the default namespace are not allowed")]
    DefaultNamespace,

    #[error("Operations on the current namespace '{0}' are not allowed")]
    CurrentNamespace(String),

    #[error("Cannot read service account namespace file {path}: {source}")]
    NamespaceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    #[error("Pod {pod} in namespace {namespace} has no containers")]
    NoContainers { pod: String, namespace: String },

    #[error("Got stderr from pod exec: {0:?}")]
    Stderr(Vec<String>),

    #[error("Cluster error: {0}")]
    Cluster(String),
}

impl SandboxError {
    /// True when the request was refused by policy rather than failing
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SandboxError::DefaultNamespace | SandboxError::CurrentNamespace(_))
    }
}
