use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use passes::config::PassesConfig;
use passes::expiry::ExpiryPolicy;
use passes::layout::{self, REQUESTS_ROOT};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::service::PassService;
use crate::store::{DocumentStore, StoreError};

static SCANNED: AtomicU64 = AtomicU64::new(0);
static DELETED: AtomicU64 = AtomicU64::new(0);
static FAILED: AtomicU64 = AtomicU64::new(0);

fn add(a: &AtomicU64, n: usize) {
    a.fetch_add(n as u64, Ordering::Relaxed);
}

/// Process-wide totals as (scanned, deleted, failed).
pub fn counters() -> (u64, u64, u64) {
    (
        SCANNED.load(Ordering::Relaxed),
        DELETED.load(Ordering::Relaxed),
        FAILED.load(Ordering::Relaxed),
    )
}

pub fn reset_counters() {
    SCANNED.store(0, Ordering::Relaxed);
    DELETED.store(0, Ordering::Relaxed);
    FAILED.store(0, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Documents that could not be read as a request; never deleted.
    pub unreadable: usize,
    /// Debounce entries dropped during cleanup.
    pub pruned: usize,
}

/// Delete every stale request in either layout. Each stored copy is judged on
/// its own, so a stale id present in both layouts loses both copies.
/// Safe to re-run: a second pass over the same state deletes nothing.
pub async fn sweep_once<S: DocumentStore + ?Sized>(
    store: &S,
    policy: &ExpiryPolicy,
    now: DateTime<Utc>,
) -> Result<SweepReport, StoreError> {
    let mut report = SweepReport::default();

    for (path, value) in store.list(REQUESTS_ROOT).await? {
        let Some(stored) = layout::decode(&path, value) else {
            report.unreadable += 1;
            continue;
        };
        report.scanned += 1;
        if !policy.is_stale(&stored.request, now) {
            continue;
        }
        match store.remove(&path).await {
            Ok(()) => {
                report.deleted += 1;
                info!(id = %stored.request.id, %path, created_at = %stored.request.created_at, "sweeper: deleted stale request");
            }
            Err(e) => {
                report.failed += 1;
                warn!(id = %stored.request.id, %path, error = %e, "sweeper: delete failed");
            }
        }
    }

    add(&SCANNED, report.scanned);
    add(&DELETED, report.deleted);
    add(&FAILED, report.failed);
    Ok(report)
}

#[derive(Clone, Debug)]
pub struct SweeperConfig {
    pub hard_delete_interval: Duration,
    pub cleanup_interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::from(&PassesConfig::default())
    }
}

impl From<&PassesConfig> for SweeperConfig {
    fn from(cfg: &PassesConfig) -> Self {
        Self {
            hard_delete_interval: cfg.hard_delete_interval,
            cleanup_interval: cfg.cleanup_interval,
        }
    }
}

/// Run the hard-delete and cleanup sweeps on their own intervals until
/// `shutdown` resolves. Both fire once immediately. Failures are logged and
/// the loop carries on.
pub async fn run_loop<S, F>(service: Arc<PassService<S>>, cfg: SweeperConfig, shutdown: F) -> Result<()>
where
    S: DocumentStore + ?Sized,
    F: Future<Output = ()>,
{
    info!(?cfg, "sweeper: starting");
    let mut hard = tokio::time::interval(cfg.hard_delete_interval);
    let mut cleanup = tokio::time::interval(cfg.cleanup_interval);
    hard.set_missed_tick_behavior(MissedTickBehavior::Delay);
    cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let (scanned, deleted, failed) = counters();
                info!(scanned, deleted, failed, "sweeper: stopping");
                return Ok(());
            }
            _ = hard.tick() => match service.sweep(Utc::now()).await {
                Ok(r) if r.deleted > 0 || r.failed > 0 => {
                    info!(deleted = r.deleted, failed = r.failed, scanned = r.scanned, "sweeper: hard delete pass")
                }
                Ok(r) => debug!(scanned = r.scanned, "sweeper: nothing to delete"),
                Err(e) => error!(error = %e, "sweeper: hard delete pass failed"),
            },
            _ = cleanup.tick() => match service.cleanup(Utc::now()).await {
                Ok(r) => {
                    if r.unreadable > 0 {
                        warn!(unreadable = r.unreadable, "sweeper: unreadable pass request documents");
                    }
                    info!(deleted = r.deleted, pruned = r.pruned, "sweeper: cleanup pass")
                }
                Err(e) => error!(error = %e, "sweeper: cleanup pass failed"),
            },
        }
    }
}
