//! Payload lists and first-chunk decoding.
//!
//! The engine stores one payload per argument. Every action and workflow on this
//! platform takes exactly one argument, so only the first payload of a list is
//! decoded; any further payloads are ignored. Large payloads may be offloaded to
//! a blob store, in which case the payload carries a key that is resolved through
//! a `PayloadFetcher`. Fetching is the only suspension point of a history walk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FlowlogError, Result};

/// Ordered list of payloads attached to an event field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payloads {
    #[serde(default)]
    pub payloads: Vec<Payload>,
}

impl Payloads {
    /// A single inline JSON payload
    pub fn json(data: Value) -> Self {
        Self {
            payloads: vec![Payload::inline(data)],
        }
    }

    /// A single payload stored externally under `key`
    pub fn external(key: impl Into<String>) -> Self {
        Self {
            payloads: vec![Payload::External {
                key: key.into(),
                size_bytes: 0,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// One payload, either carried inline or stored out of band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    External {
        key: String,
        #[serde(default)]
        size_bytes: u64,
    },
    Inline {
        #[serde(default)]
        metadata: BTreeMap<String, String>,
        data: Value,
    },
}

impl Payload {
    pub fn inline(data: Value) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("encoding".to_string(), "json/plain".to_string());
        Payload::Inline { metadata, data }
    }
}

/// Resolves externally stored payloads
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Value>;
}

/// Fetcher for deployments without a blob store; every external payload fails.
#[derive(Debug, Clone, Default)]
pub struct InlineOnly;

#[async_trait]
impl PayloadFetcher for InlineOnly {
    async fn fetch(&self, key: &str) -> Result<Value> {
        Err(FlowlogError::PayloadFetch {
            key: key.to_string(),
            reason: "no blob store configured".to_string(),
        })
    }
}

/// Reads externally stored payloads from `<root>/<key>.json`
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.contains("..");
        if !valid {
            return Err(FlowlogError::PayloadFetch {
                key: key.to_string(),
                reason: "invalid blob key".to_string(),
            });
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl PayloadFetcher for DirectoryFetcher {
    async fn fetch(&self, key: &str) -> Result<Value> {
        let path = self.blob_path(key)?;
        trace!("Fetching payload blob {}", path.display());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FlowlogError::PayloadFetch {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| FlowlogError::PayloadFetch {
            key: key.to_string(),
            reason: format!("blob is not JSON: {}", e),
        })
    }
}

/// Resolve a single payload to JSON
pub async fn resolve(payload: &Payload, fetcher: &dyn PayloadFetcher) -> Result<Value> {
    match payload {
        Payload::Inline { data, .. } => Ok(data.clone()),
        Payload::External { key, .. } => fetcher.fetch(key).await,
    }
}

/// Return the decoded JSON of the first payload, or `None` for an empty list.
pub async fn first_payload(payloads: &Payloads, fetcher: &dyn PayloadFetcher) -> Result<Option<Value>> {
    if payloads.payloads.len() > 1 {
        debug!(
            "Ignoring {} trailing payloads, only the first is decoded",
            payloads.payloads.len() - 1
        );
    }
    match payloads.payloads.first() {
        None => Ok(None),
        Some(payload) => resolve(payload, fetcher).await.map(Some),
    }
}

/// Decode the first payload into `T`; an empty list is a malformed event.
pub async fn decode_first<T: DeserializeOwned>(
    payloads: &Payloads,
    fetcher: &dyn PayloadFetcher,
    event_id: u64,
    field: &str,
) -> Result<T> {
    let value = first_payload(payloads, fetcher)
        .await?
        .ok_or_else(|| FlowlogError::malformed(event_id, format!("missing {} payload", field)))?;
    serde_json::from_value(value)
        .map_err(|e| FlowlogError::PayloadDecode(format!("event {} {}: {}", event_id, field, e)))
}
