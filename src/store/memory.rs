//! In-process backend. Same contract as the file store, nothing persisted.

use super::{validate_component, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct MemoryStore {
    /// collection -> key -> record
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_address(collection: &str, key: &str) -> StoreResult<()> {
    validate_component(collection)?;
    validate_component(key)
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, collection: &str, key: &str, value: &Value) -> StoreResult<()> {
        check_address(collection, key)?;
        let mut collections = self.collections.lock();
        let records = collections.entry(collection.to_owned()).or_default();
        if records.contains_key(key) {
            return Err(StoreError::already_exists(collection, key));
        }
        records.insert(key.to_owned(), value.clone());
        Ok(())
    }

    async fn read(&self, collection: &str, key: &str) -> StoreResult<Value> {
        check_address(collection, key)?;
        self.collections
            .lock()
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, key))
    }

    async fn update(&self, collection: &str, key: &str, value: &Value) -> StoreResult<()> {
        check_address(collection, key)?;
        let mut collections = self.collections.lock();
        match collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(key))
        {
            Some(slot) => {
                *slot = value.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(collection, key)),
        }
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        check_address(collection, key)?;
        let mut collections = self.collections.lock();
        collections
            .get_mut(collection)
            .and_then(|records| records.remove(key))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection, key))
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<String>> {
        validate_component(collection)?;
        Ok(self
            .collections
            .lock()
            .get(collection)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }
}
