//! File-backed document store.
//!
//! Each namespace is one JSON object on disk:
//!
//! | Namespace | Path |
//! |-----------|------|
//! | `rules` | `<base_dir>/data/rules.json` |
//! | `afk` | `<base_dir>/data/afk.json` |
//!
//! Namespaces are read lazily on first access and cached. Every write
//! rewrites the namespace file through a temporary file and a rename, so a
//! crash never leaves a half-written document behind.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gavel_core::{Store, StoreError, StoreResult};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace};

type Namespace = BTreeMap<String, Value>;

/// [`Store`] persisted as one JSON file per namespace.
pub struct FileStore {
    data_dir: PathBuf,
    cache: Mutex<HashMap<String, Namespace>>,
}

impl FileStore {
    /// Opens (and creates, if needed) `<base_dir>/data/`.
    pub async fn open(base_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = base_dir.as_ref().join("data");
        tokio::fs::create_dir_all(&data_dir).await?;
        debug!(path = %data_dir.display(), "File store opened");
        Ok(Self {
            data_dir,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn namespace_path(&self, namespace: &str) -> StoreResult<PathBuf> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(namespace.to_string()));
        }
        Ok(self.data_dir.join(format!("{namespace}.json")))
    }

    /// Runs `f` on a namespace, loading it from disk on first use.
    async fn with_namespace<T>(
        &self,
        namespace: &str,
        f: impl FnOnce(&mut Namespace) -> (T, bool),
    ) -> StoreResult<T> {
        let path = self.namespace_path(namespace)?;
        let mut cache = self.cache.lock().await;

        if !cache.contains_key(namespace) {
            let loaded = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice(&bytes)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Namespace::new(),
                Err(e) => return Err(e.into()),
            };
            trace!(namespace, keys = loaded.len(), "Namespace loaded");
            cache.insert(namespace.to_string(), loaded);
        }

        let Some(docs) = cache.get_mut(namespace) else {
            return Err(StoreError::InvalidKey(namespace.to_string()));
        };
        let (result, dirty) = f(docs);
        if dirty {
            persist(&path, docs).await?;
        }
        Ok(result)
    }
}

async fn persist(path: &Path, docs: &Namespace) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(docs)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Value>> {
        self.with_namespace(namespace, |docs| (docs.get(key).cloned(), false))
            .await
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) -> StoreResult<()> {
        self.with_namespace(namespace, |docs| {
            docs.insert(key.to_string(), value);
            ((), true)
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<bool> {
        self.with_namespace(namespace, |docs| {
            let existed = docs.remove(key).is_some();
            (existed, existed)
        })
        .await
    }

    async fn keys(&self, namespace: &str) -> StoreResult<Vec<String>> {
        self.with_namespace(namespace, |docs| (docs.keys().cloned().collect(), false))
            .await
    }
}
