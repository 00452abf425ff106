//! JetStream key/value backend.
//!
//! Store paths map to KV keys by turning `/` into `.`, so a subscription on
//! `passRequests` becomes a watch on `passRequests.>`.

use anyhow::Result;
use async_nats::jetstream::{self, kv::Entry, kv::Operation, kv::Store};
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::{is_under, normalize_path, DocumentStore, StoreError, StoreEvent};

const EVENT_BUFFER: usize = 256;

#[derive(Clone)]
pub struct NatsKvStore {
    kv: Store,
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// KV keys allow `[-/_=.a-zA-Z0-9]`; `.` separates tokens.
fn segment_key(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn to_key(path: &str) -> Result<String, StoreError> {
    let path = normalize_path(path)?;
    Ok(path.split('/').map(segment_key).collect::<Vec<_>>().join("."))
}

pub fn to_path(key: &str) -> String {
    key.replace('.', "/")
}

impl NatsKvStore {
    /// Connect using `NATS_URL`, `PASS_KV_BUCKET` and optional `NATS_CREDS_PATH`.
    pub async fn connect_from_env() -> Result<Self> {
        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string());
        let bucket = std::env::var("PASS_KV_BUCKET").unwrap_or_else(|_| "hostel".to_string());
        Self::with_connection(&nats_url, &bucket).await
    }

    pub async fn with_connection(nats_url: &str, bucket: &str) -> Result<Self> {
        info!(%nats_url, %bucket, "connecting to NATS KV");

        let client = if let Ok(creds_path) = std::env::var("NATS_CREDS_PATH") {
            info!("Using credentials file: {}", creds_path);
            async_nats::ConnectOptions::new()
                .credentials_file(&creds_path)
                .await?
                .connect(nats_url)
                .await?
        } else {
            warn!("No NATS credentials provided, connecting without auth");
            async_nats::connect(nats_url).await?
        };

        let js = jetstream::new(client);
        let kv = match js.get_key_value(bucket).await {
            Ok(store) => {
                info!("Using existing KV bucket: {}", bucket);
                store
            }
            Err(_) => {
                info!("Creating new KV bucket: {}", bucket);
                js.create_key_value(jetstream::kv::Config {
                    bucket: bucket.to_string(),
                    description: "Hostel pass requests and user directory".to_string(),
                    ..Default::default()
                })
                .await?
            }
        };

        Ok(Self { kv })
    }
}

#[async_trait]
impl DocumentStore for NatsKvStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let key = to_key(path)?;
        match self.kv.get(&key).await.map_err(backend)? {
            Some(bytes) if !bytes.is_empty() => Ok(Some(serde_json::from_slice(&bytes)?)),
            _ => Ok(None),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let prefix_path = to_path(&to_key(prefix)?);
        let mut keys = self.kv.keys().await.map_err(backend)?.boxed();
        let mut out = Vec::new();

        while let Some(key) = keys.next().await {
            let key = match key {
                Ok(k) => k,
                Err(e) => {
                    warn!(error = %e, "error reading key from KV");
                    continue;
                }
            };
            let path = to_path(&key);
            if !is_under(&path, &prefix_path) {
                continue;
            }
            match self.kv.get(&key).await.map_err(backend)? {
                Some(bytes) if !bytes.is_empty() => match serde_json::from_slice(&bytes) {
                    Ok(v) => out.push((path, v)),
                    Err(e) => warn!(%key, error = %e, "skipping non-JSON KV entry"),
                },
                _ => {}
            }
        }

        out.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(prefix = %prefix_path, count = out.len(), "listed KV documents");
        Ok(out)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let key = to_key(path)?;
        let bytes = serde_json::to_vec(&value)?;
        self.kv.put(&key, bytes.into()).await.map_err(backend)?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let key = to_key(path)?;
        self.kv.delete(&key).await.map_err(backend)?;
        Ok(())
    }

    async fn subscribe(&self, prefix: &str) -> Result<BoxStream<'static, StoreEvent>, StoreError> {
        let filter = format!("{}.>", to_key(prefix)?);
        let kv = self.kv.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        // `Watch` borrows `kv`; both stay inside the task.
        tokio::spawn(async move {
            let mut watch = match kv.watch(&filter).await {
                Ok(w) => {
                    let _ = ready_tx.send(Ok(()));
                    w
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(backend(e)));
                    return;
                }
            };
            loop {
                let entry = tokio::select! {
                    _ = tx.closed() => break,
                    entry = watch.next() => match entry {
                        Some(entry) => entry,
                        None => break,
                    },
                };
                let Some(event) = to_event(entry) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            debug!(%filter, "KV watch closed");
        });

        ready_rx
            .await
            .map_err(|_| StoreError::Backend("KV watch task exited".to_string()))??;
        Ok(ReceiverStream::new(rx).boxed())
    }
}

fn to_event<E: std::fmt::Display>(entry: Result<Entry, E>) -> Option<StoreEvent> {
    let entry = match entry {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "KV watch error");
            return None;
        }
    };
    let path = to_path(&entry.key);
    match entry.operation {
        Operation::Put => match serde_json::from_slice(&entry.value) {
            Ok(value) => Some(StoreEvent::Put { path, value }),
            Err(e) => {
                warn!(key = %entry.key, error = %e, "non-JSON KV update");
                None
            }
        },
        Operation::Delete | Operation::Purge => Some(StoreEvent::Removed { path }),
    }
}
