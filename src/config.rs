use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flowlog::executor::HttpExecutorConfig;
use flowlog::projection::view::DEFAULT_MAX_CONCURRENT_EXECUTIONS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub storage: StorageConfig,
    pub projection: ProjectionConfig,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub store_dir: PathBuf,
    /// Directory of externally stored payload blobs; inline payloads only when unset
    pub blob_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("flowlog"),
            blob_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub max_concurrent_executions: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub url: String,
    pub timeout_ms: u64,
    pub workspace_id: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let defaults = HttpExecutorConfig::default();
        Self {
            url: defaults.base_url,
            timeout_ms: defaults.timeout.as_millis() as u64,
            workspace_id: None,
        }
    }
}

impl ExecutorConfig {
    pub fn to_client_config(&self) -> HttpExecutorConfig {
        HttpExecutorConfig {
            base_url: self.url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            workspace_id: self.workspace_id.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            storage: StorageConfig::default(),
            projection: ProjectionConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.projection.max_concurrent_executions, 8);
        assert_eq!(config.executor.url, "http://localhost:8002");
        assert_eq!(config.executor.timeout_ms, 300_000);
        assert!(config.storage.blob_dir.is_none());
        assert!(config.storage.store_dir.ends_with("flowlog"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "projection:\n  max_concurrent_executions: 2\nexecutor:\n  workspace_id: ws-1").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.projection.max_concurrent_executions, 2);
        assert_eq!(config.executor.workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(config.executor.url, "http://localhost:8002");
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let missing = PathBuf::from("/nonexistent/flowlog.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_executor_client_config() {
        let executor = ExecutorConfig {
            url: "http://executor:9000".to_string(),
            timeout_ms: 1500,
            workspace_id: Some("ws".to_string()),
        };
        let client = executor.to_client_config();
        assert_eq!(client.base_url, "http://executor:9000");
        assert_eq!(client.timeout, Duration::from_millis(1500));
    }
}
