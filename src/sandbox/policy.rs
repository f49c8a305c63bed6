//! Namespace access policy and kubeconfig validation.
//!
//! Operations never run against the `default` namespace, nor against the
//! namespace of the pod this process runs in. A kubeconfig is only accepted
//! when passed explicitly as base64 YAML; nothing is loaded from the
//! environment or default locations.

use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use log::{info, warn};
use serde_yaml::{Mapping, Value};

use super::SandboxError;

/// Namespace no operation may target
pub const DEFAULT_NAMESPACE: &str = "default";

/// Environment variable set inside every pod
pub const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Service-account file holding the pod's own namespace
pub const NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Decides which namespaces may be operated on
#[derive(Debug, Clone)]
pub struct NamespacePolicy {
    in_cluster: bool,
    namespace_file: PathBuf,
}

impl NamespacePolicy {
    /// Policy for the current process
    pub fn from_env() -> Self {
        Self {
            in_cluster: std::env::var_os(SERVICE_HOST_ENV).is_some(),
            namespace_file: PathBuf::from(NAMESPACE_FILE),
        }
    }

    /// Policy for a process running in a pod whose namespace is in `namespace_file`
    pub fn in_cluster(namespace_file: impl AsRef<Path>) -> Self {
        Self {
            in_cluster: true,
            namespace_file: namespace_file.as_ref().to_path_buf(),
        }
    }

    /// Policy for a process running outside any cluster
    pub fn out_of_cluster() -> Self {
        Self {
            in_cluster: false,
            namespace_file: PathBuf::from(NAMESPACE_FILE),
        }
    }

    /// Reject `default` and the namespace this process runs in
    pub fn validate(&self, namespace: &str) -> Result<(), SandboxError> {
        info!("Validating namespace access for {}", namespace);
        if namespace == DEFAULT_NAMESPACE {
            warn!("Attempted operation on default namespace");
            return Err(SandboxError::DefaultNamespace);
        }
        if !self.in_cluster {
            return Ok(());
        }

        let current = std::fs::read_to_string(&self.namespace_file).map_err(|e| {
            warn!("Service account namespace file not readable: {}", e);
            SandboxError::NamespaceFile {
                path: self.namespace_file.clone(),
                source: e,
            }
        })?;
        let current = current.trim();
        if current == namespace {
            warn!("Attempted operation on current namespace {}", current);
            return Err(SandboxError::CurrentNamespace(current.to_string()));
        }
        Ok(())
    }
}

/// A decoded, validated kubeconfig
#[derive(Debug, Clone, PartialEq)]
pub struct Kubeconfig {
    document: Mapping,
}

impl Kubeconfig {
    /// Decode base64 YAML and validate it
    ///
    /// Padding on the base64 input is optional. The document must be a
    /// non-empty mapping with at least one context, none of which targets the
    /// `default` namespace.
    pub fn decode(encoded: &str) -> Result<Self, SandboxError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(SandboxError::InvalidKubeconfig("kubeconfig cannot be empty".to_string()));
        }
        let bytes = STANDARD_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| SandboxError::InvalidKubeconfig(format!("invalid base64: {}", e)))?;
        let document: Value = serde_yaml::from_slice(&bytes)
            .map_err(|e| SandboxError::InvalidKubeconfig(format!("invalid YAML: {}", e)))?;

        let Value::Mapping(document) = document else {
            return Err(SandboxError::InvalidKubeconfig("kubeconfig must be a mapping".to_string()));
        };
        if document.is_empty() {
            return Err(SandboxError::InvalidKubeconfig("kubeconfig cannot be empty".to_string()));
        }

        let contexts = document
            .get("contexts")
            .and_then(Value::as_sequence)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SandboxError::InvalidKubeconfig("kubeconfig must contain at least one context".to_string()))?;
        for context in contexts {
            if context_namespace(context) == Some(DEFAULT_NAMESPACE) {
                let name = context.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
                warn!("Kubeconfig context {} targets the default namespace", name);
                return Err(SandboxError::InvalidKubeconfig(
                    "kubeconfig cannot contain default namespace".to_string(),
                ));
            }
        }

        info!("Loaded kubeconfig with {} contexts", contexts.len());
        Ok(Self { document })
    }

    /// Names of all contexts
    pub fn context_names(&self) -> Vec<String> {
        self.document
            .get("contexts")
            .and_then(Value::as_sequence)
            .map(|contexts| {
                contexts
                    .iter()
                    .filter_map(|c| c.get("name").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn document(&self) -> &Mapping {
        &self.document
    }
}

/// Namespace of a context entry, flat or nested under `context`
fn context_namespace(entry: &Value) -> Option<&str> {
    entry
        .get("namespace")
        .or_else(|| entry.get("context").and_then(|c| c.get("namespace")))
        .and_then(Value::as_str)
}
