//! Document store abstraction.
//!
//! The store is a flat map of `/`-separated paths to JSON documents. A path
//! is either a document or a prefix of other documents, never both.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod file;
pub mod memory;
pub mod nats;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use nats::NatsKvStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid store path '{0}'")]
    InvalidPath(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Put { path: String, value: Value },
    Removed { path: String },
}

impl StoreEvent {
    pub fn path(&self) -> &str {
        match self {
            StoreEvent::Put { path, .. } | StoreEvent::Removed { path } => path,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Every document at or below `prefix`, with its path.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError>;

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Changes at or below `prefix` from now on.
    async fn subscribe(&self, prefix: &str) -> Result<BoxStream<'static, StoreEvent>, StoreError>;

    /// Shallow merge of `fields` into the document; `null` removes a field.
    /// Creates the document when missing. Read-modify-write: last writer wins.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut doc = self
            .get(path)
            .await?
            .unwrap_or_else(|| Value::Object(Map::new()));
        merge_fields(&mut doc, fields);
        self.set(path, doc).await
    }

    /// Store `value` under a freshly generated key below `prefix` and return
    /// the key.
    async fn push(&self, prefix: &str, value: Value) -> Result<String, StoreError> {
        let key = uuid::Uuid::new_v4().simple().to_string();
        self.set(&format!("{}/{}", normalize_path(prefix)?, key), value)
            .await?;
        Ok(key)
    }
}

pub fn merge_fields(doc: &mut Value, fields: Map<String, Value>) {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    if let Value::Object(obj) = doc {
        for (k, v) in fields {
            if v.is_null() {
                obj.remove(&k);
            } else {
                obj.insert(k, v);
            }
        }
    }
}

/// Trim surrounding slashes and reject empty segments.
pub fn normalize_path(path: &str) -> Result<String, StoreError> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|seg| seg.trim().is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(trimmed.to_string())
}

/// `path` equals `prefix` or lies below it. An empty prefix matches everything.
pub fn is_under(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}
