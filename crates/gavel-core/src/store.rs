//! Key/value storage used by feature modules.
//!
//! The dispatch core never reads the store itself; modules capture an
//! `Arc<dyn Store>` and keep their own documents under a namespace named
//! after the module.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreResult;

/// Namespaced JSON document store.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Value>>;

    async fn put(&self, namespace: &str, key: &str, value: Value) -> StoreResult<()>;

    /// Removes a key, returning whether it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<bool>;

    /// Keys of a namespace in ascending order.
    async fn keys(&self, namespace: &str) -> StoreResult<Vec<String>>;
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) -> StoreResult<()> {
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<bool> {
        Ok(self
            .namespaces
            .write()
            .get_mut(namespace)
            .is_some_and(|docs| docs.remove(key).is_some()))
    }

    async fn keys(&self, namespace: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }
}
