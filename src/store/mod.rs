//! Record persistence addressed by `(collection, key)`.
//!
//! Provides:
//! - [`ObjectStore`]: create/read/update/delete/list over JSON records
//! - [`FileStore`]: one `<collection>/<key>.json` file per record
//! - [`MemoryStore`]: in-process map, same contract, nothing touches disk
//!
//! The store holds no schema knowledge. Callers convert to and from their own
//! record types with serde; records cross the trait as `serde_json::Value`.
//!
//! ## Consistency
//! A single write either lands in full or not at all. Operations on the same
//! key from concurrent requests are not serialized: last writer wins.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::StorageConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Errors surfaced by an [`ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {collection}/{key} already exists")]
    AlreadyExists { collection: String, key: String },

    #[error("record {collection}/{key} not found")]
    NotFound { collection: String, key: String },

    #[error("invalid store address component: {0:?}")]
    InvalidKey(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn already_exists(collection: &str, key: &str) -> Self {
        Self::AlreadyExists {
            collection: collection.to_owned(),
            key: key.to_owned(),
        }
    }

    pub(crate) fn not_found(collection: &str, key: &str) -> Self {
        Self::NotFound {
            collection: collection.to_owned(),
            key: key.to_owned(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Generic record store keyed by `(collection, key)`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name ("file", "memory").
    fn name(&self) -> &str;

    /// Persist a new record. Fails with `AlreadyExists` if the address is taken.
    async fn create(&self, collection: &str, key: &str, value: &Value) -> StoreResult<()>;

    /// Fetch a record. Absent or unparseable content is `NotFound`.
    async fn read(&self, collection: &str, key: &str) -> StoreResult<Value>;

    /// Replace an existing record in full. Fails with `NotFound` if absent.
    async fn update(&self, collection: &str, key: &str, value: &Value) -> StoreResult<()>;

    /// Remove an existing record. Fails with `NotFound` if absent.
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()>;

    /// Keys currently present in a collection. An unknown collection is empty.
    async fn list(&self, collection: &str) -> StoreResult<Vec<String>>;
}

/// Reject address components that could escape the collection directory.
///
/// Accepts ASCII alphanumerics plus `-`, `_` and `+`.
pub fn validate_component(component: &str) -> StoreResult<()> {
    let ok = !component.is_empty()
        && component
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'+'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(component.to_owned()))
    }
}

/// Build the configured store backend.
pub fn create_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.backend.as_str() {
        "file" => {
            let dir = config.resolved_data_dir();
            let store = FileStore::open(&dir)?;
            tracing::info!(data_dir = %dir.display(), "File store initialized");
            Ok(Arc::new(store))
        }
        "memory" => {
            tracing::warn!("Memory store selected; records are lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => anyhow::bail!("Unknown storage backend '{other}' (expected \"file\" or \"memory\")"),
    }
}
