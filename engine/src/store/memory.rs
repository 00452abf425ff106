use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use super::{is_under, normalize_path, DocumentStore, StoreError, StoreEvent};

const EVENT_CAPACITY: usize = 1024;

/// In-process store. Clones share the same documents and subscribers.
#[derive(Clone)]
pub struct MemoryStore {
    docs: Arc<RwLock<BTreeMap<String, Value>>>,
    events: broadcast::Sender<StoreEvent>,
    fail_writes: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_documents(BTreeMap::new())
    }

    pub fn from_documents(docs: BTreeMap<String, Value>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            docs: Arc::new(RwLock::new(docs)),
            events,
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn snapshot(&self) -> BTreeMap<String, Value> {
        self.docs.read().await.clone()
    }

    /// Make every subsequent write fail with [`StoreError::Unavailable`].
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let path = normalize_path(path)?;
        Ok(self.docs.read().await.get(&path).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let prefix = normalize_path(prefix)?;
        let guard = self.docs.read().await;
        Ok(guard
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| is_under(k, &prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        let path = normalize_path(path)?;
        self.docs.write().await.insert(path.clone(), value.clone());
        self.emit(StoreEvent::Put { path, value });
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let path = normalize_path(path)?;
        if self.docs.write().await.remove(&path).is_some() {
            self.emit(StoreEvent::Removed { path });
        }
        Ok(())
    }

    async fn subscribe(&self, prefix: &str) -> Result<BoxStream<'static, StoreEvent>, StoreError> {
        let prefix = normalize_path(prefix)?;
        let stream = BroadcastStream::new(self.events.subscribe()).filter_map(move |item| {
            let out = match item {
                Ok(event) if is_under(event.path(), &prefix) => Some(event),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "memory store subscriber lagged");
                    None
                }
            };
            futures_util::future::ready(out)
        });
        Ok(stream.boxed())
    }
}
