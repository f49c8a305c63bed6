//! Commands in pods, behind the namespace policy.

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::SandboxError;
use super::policy::{Kubeconfig, NamespacePolicy};

/// Default exec timeout
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw output of one exec call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Cluster operations the sandbox needs
#[async_trait]
pub trait PodExec: Send + Sync {
    async fn list_pods(&self, kubeconfig: &Kubeconfig, namespace: &str) -> Result<Vec<String>, SandboxError>;

    async fn list_containers(
        &self,
        kubeconfig: &Kubeconfig,
        pod: &str,
        namespace: &str,
    ) -> Result<Vec<String>, SandboxError>;

    async fn exec(
        &self,
        kubeconfig: &Kubeconfig,
        target: &PodTarget,
        command: &[String],
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError>;
}

/// Fully resolved exec target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTarget {
    pub pod: String,
    pub container: String,
    pub namespace: String,
}

/// Outcome of a successful command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodExecResult {
    pub pod: String,
    pub container: String,
    pub namespace: String,
    pub command: Vec<String>,
    pub stdout: Vec<String>,
}

/// Pod operations bound to a policy and an explicit kubeconfig
pub struct PodSandbox<'a> {
    backend: &'a dyn PodExec,
    policy: NamespacePolicy,
    timeout: Duration,
}

impl<'a> PodSandbox<'a> {
    /// Sandbox under the policy of the current process
    pub fn new(backend: &'a dyn PodExec) -> Self {
        Self {
            backend,
            policy: NamespacePolicy::from_env(),
            timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: NamespacePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn list_pods(&self, namespace: &str, kubeconfig_base64: &str) -> Result<Vec<String>, SandboxError> {
        self.policy.validate(namespace)?;
        let kubeconfig = Kubeconfig::decode(kubeconfig_base64)?;
        let pods = self.backend.list_pods(&kubeconfig, namespace).await?;
        info!("Listed {} pods in {}", pods.len(), namespace);
        Ok(pods)
    }

    pub async fn list_containers(
        &self,
        pod: &str,
        namespace: &str,
        kubeconfig_base64: &str,
    ) -> Result<Vec<String>, SandboxError> {
        self.policy.validate(namespace)?;
        let kubeconfig = Kubeconfig::decode(kubeconfig_base64)?;
        self.backend.list_containers(&kubeconfig, pod, namespace).await
    }

    /// Run `command` in a pod; the first container is used when none is given
    ///
    /// Any stderr output fails the call. Stdout is returned split into lines.
    pub async fn exec_in_pod(
        &self,
        pod: &str,
        command: Vec<String>,
        namespace: &str,
        kubeconfig_base64: &str,
        container: Option<&str>,
    ) -> Result<PodExecResult, SandboxError> {
        info!("Executing {:?} in pod {}/{}", command, namespace, pod);
        self.policy.validate(namespace)?;
        let kubeconfig = Kubeconfig::decode(kubeconfig_base64)?;

        let container = match container {
            Some(c) => c.to_string(),
            None => {
                let containers = self.backend.list_containers(&kubeconfig, pod, namespace).await?;
                let first = containers.into_iter().next().ok_or_else(|| SandboxError::NoContainers {
                    pod: pod.to_string(),
                    namespace: namespace.to_string(),
                })?;
                info!("Using first container {} of pod {}", first, pod);
                first
            }
        };

        let target = PodTarget {
            pod: pod.to_string(),
            container,
            namespace: namespace.to_string(),
        };
        let output = self.backend.exec(&kubeconfig, &target, &command, self.timeout).await?;

        let stderr: Vec<String> = output.stderr.lines().map(str::to_string).collect();
        if !stderr.is_empty() {
            warn!("Unexpected stderr from {}/{}: {:?}", target.pod, target.container, stderr);
            return Err(SandboxError::Stderr(stderr));
        }

        let stdout: Vec<String> = output.stdout.lines().map(str::to_string).collect();
        info!("Command in {} produced {} lines", target.pod, stdout.len());
        Ok(PodExecResult {
            pod: target.pod,
            container: target.container,
            namespace: target.namespace,
            command,
            stdout,
        })
    }
}
