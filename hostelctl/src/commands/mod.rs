pub mod account;
pub mod requests;
mod table;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use pass_engine::dashboard::{Dashboard, Notice, NoticeLevel};
use pass_engine::store::{DocumentStore, FileStore, NatsKvStore};
use pass_engine::PassService;
use passes::auth::Session;

pub type Service = PassService<dyn DocumentStore>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    File,
    Nats,
}

pub struct Context {
    backend: Backend,
    store_path: PathBuf,
    session_path: PathBuf,
}

impl Context {
    pub fn new(backend: Backend, store_path: PathBuf, session_path: PathBuf) -> Self {
        Self {
            backend,
            store_path,
            session_path,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    pub async fn open_store(&self) -> Result<Arc<dyn DocumentStore>> {
        Ok(match self.backend {
            Backend::File => Arc::new(
                FileStore::open(&self.store_path)
                    .with_context(|| format!("opening store {}", self.store_path.display()))?,
            ),
            Backend::Nats => Arc::new(
                NatsKvStore::connect_from_env()
                    .await
                    .context("connecting to the NATS KV store")?,
            ),
        })
    }

    pub async fn service(&self) -> Result<Arc<Service>> {
        let config = passes::config::load_from_env().context("loading pass configuration")?;
        let store = self.open_store().await?;
        let service = PassService::from_store(store, config)
            .await
            .context("loading user directory")?;
        Ok(Arc::new(service))
    }

    pub fn session(&self) -> Result<Session> {
        Session::load(&self.session_path).context("run `hostelctl login` first")
    }

    pub async fn dashboard(&self) -> Result<Dashboard<dyn DocumentStore>> {
        let session = self.session()?;
        Ok(Dashboard::new(self.service().await?, session))
    }
}

/// Print queued notices. Returns whether any of them was an error.
pub fn print_notices(notices: Vec<Notice>) -> bool {
    let mut failed = false;
    for notice in notices {
        match notice.level {
            NoticeLevel::Info => println!("{}", notice.message),
            NoticeLevel::Error => {
                failed = true;
                eprintln!("error: {}", notice.message);
            }
        }
    }
    failed
}
