//! Flat-file backend: `<data_dir>/<collection>/<key>.json`.
//!
//! Writes go to a uniquely named temp file in the collection directory first.
//! `create` hard-links the temp file into place (the link fails if the target
//! exists); `update` renames it over the target. Readers never observe a
//! partially written record.

use super::{validate_component, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const RECORD_EXT: &str = "json";

/// JSON-file-per-record store rooted at a base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Open (or create) a store rooted at `base_dir`.
    pub fn open(base_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(base_dir)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn collection_dir(&self, collection: &str) -> StoreResult<PathBuf> {
        validate_component(collection)?;
        Ok(self.base_dir.join(collection))
    }

    fn record_path(&self, collection: &str, key: &str) -> StoreResult<PathBuf> {
        validate_component(key)?;
        Ok(self
            .collection_dir(collection)?
            .join(format!("{key}.{RECORD_EXT}")))
    }

    /// Serialize `value` into a fresh temp file inside `dir` and return its path.
    async fn write_temp(dir: &Path, value: &Value) -> StoreResult<PathBuf> {
        let bytes = serde_json::to_vec(value)?;
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));

        let mut file = tokio::fs::File::create(&tmp).await?;
        let written = async {
            file.write_all(&bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            discard_temp(&tmp).await;
            return Err(e.into());
        }
        Ok(tmp)
    }
}

async fn discard_temp(tmp: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %tmp.display(), "Failed to remove temp record file: {e}");
        }
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn create(&self, collection: &str, key: &str, value: &Value) -> StoreResult<()> {
        let path = self.record_path(collection, key)?;
        let dir = self.collection_dir(collection)?;
        tokio::fs::create_dir_all(&dir).await?;

        let tmp = Self::write_temp(&dir, value).await?;
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        discard_temp(&tmp).await;

        match linked {
            Ok(()) => {
                tracing::debug!(collection, key, "Record created");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::already_exists(collection, key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, collection: &str, key: &str) -> StoreResult<Value> {
        let path = self.record_path(collection, key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::not_found(collection, key));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(collection, key, "Unparseable record treated as missing: {e}");
            StoreError::not_found(collection, key)
        })
    }

    async fn update(&self, collection: &str, key: &str, value: &Value) -> StoreResult<()> {
        let path = self.record_path(collection, key)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::not_found(collection, key));
            }
            Err(e) => return Err(e.into()),
        }

        let dir = self.collection_dir(collection)?;
        let tmp = Self::write_temp(&dir, value).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            discard_temp(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(collection, key, "Record updated");
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        let path = self.record_path(collection, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(collection, key, "Record deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(collection, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<String>> {
        let dir = self.collection_dir(collection)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
