use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{normalize_path, DocumentStore, MemoryStore, StoreError, StoreEvent};

/// JSON-file backed store for single-host use. The whole document map is
/// rewritten after every write. Subscriptions only see changes made through
/// this process.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let docs: BTreeMap<String, Value> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), documents = docs.len(), "opened file store");

        Ok(Self {
            path,
            inner: MemoryStore::from_documents(docs),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `snapshot` to disk. Callers apply the change in memory only
    /// after this succeeds.
    async fn persist(&self, snapshot: BTreeMap<String, Value>) -> Result<(), StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let json = serde_json::to_vec_pretty(&snapshot)?;
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, json)?;
            std::fs::rename(&tmp, &path)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Backend(format!("joining file store persistence task: {}", e)))?
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(path).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        self.inner.list(prefix).await
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = normalize_path(path)?;
        let _guard = self.write_lock.lock().await;
        let mut next = self.inner.snapshot().await;
        next.insert(path.clone(), value.clone());
        self.persist(next).await?;
        self.inner.set(&path, value).await
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize_path(path)?;
        let _guard = self.write_lock.lock().await;
        let mut next = self.inner.snapshot().await;
        if next.remove(&path).is_none() {
            return Ok(());
        }
        self.persist(next).await?;
        self.inner.remove(&path).await
    }

    async fn subscribe(&self, prefix: &str) -> Result<BoxStream<'static, StoreEvent>, StoreError> {
        self.inner.subscribe(prefix).await
    }
}
