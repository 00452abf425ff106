use std::sync::Arc;

use anyhow::Context;
use pass_engine::store::{DocumentStore, FileStore, NatsKvStore};
use pass_engine::sweeper::{run_loop, SweeperConfig};
use pass_engine::PassService;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let enabled = std::env::var("SWEEPER_ENABLED").unwrap_or_else(|_| "0".to_string()) == "1";
    if !enabled {
        println!("Sweeper disabled (set SWEEPER_ENABLED=1 to start)");
        return Ok(());
    }

    let config = passes::config::load_from_env().context("loading pass configuration")?;
    let store: Arc<dyn DocumentStore> = match std::env::var("HOSTEL_BACKEND").as_deref() {
        Ok("nats") => Arc::new(NatsKvStore::connect_from_env().await?),
        _ => {
            let path = std::env::var("HOSTEL_STORE")
                .unwrap_or_else(|_| ".hostel/store.json".to_string());
            info!(%path, "using file store");
            Arc::new(FileStore::open(path)?)
        }
    };

    let service = Arc::new(PassService::from_store(store, config.clone()).await?);
    run_loop(service, SweeperConfig::from(&config), async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
