//! Expiry Sweep Background Task
//!
//! Engine TTL is enforced on read, so expired entries stay on disk until
//! something removes them. This task periodically purges them from the
//! engine and drops the matching tokens from the key index, keeping both
//! disk usage and [`CacheStore::count`](crate::CacheStore::count) in line
//! with what is actually retrievable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::{Engine, EngineError};
use crate::index::KeyIndex;
use crate::key::RawKey;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for sweep activity.
#[derive(Debug, Default)]
pub struct SweepMetrics {
    /// Engine entries purged since startup
    pub entries_purged: AtomicU64,

    /// Index entries removed alongside purged data entries
    pub index_entries_removed: AtomicU64,

    /// Sweep cycles completed
    pub sweep_cycles: AtomicU64,

    /// Cycles that failed
    pub sweep_errors: AtomicU64,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweepSnapshot {
        SweepSnapshot {
            entries_purged: self.entries_purged.load(Ordering::Relaxed),
            index_entries_removed: self.index_entries_removed.load(Ordering::Relaxed),
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SweepMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSnapshot {
    pub entries_purged: u64,
    pub index_entries_removed: u64,
    pub sweep_cycles: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Purge expired entries every `period` until shutdown is signalled.
pub async fn expiry_sweep_task(
    engine: Arc<dyn Engine>,
    index: Arc<KeyIndex>,
    period: Duration,
    metrics: Arc<SweepMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweepMetrics> {
    let mut sweep_interval = interval(period);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(period_secs = period.as_secs_f64(), "Expiry sweep task started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Expiry sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep_once(&engine, &index, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        entries_purged = snapshot.entries_purged,
        index_entries_removed = snapshot.index_entries_removed,
        sweep_cycles = snapshot.sweep_cycles,
        sweep_errors = snapshot.sweep_errors,
        "Expiry sweep task completed"
    );

    metrics
}

/// Outcome of one purge cycle, computed on the blocking pool.
struct CycleOutcome {
    purged: u64,
    removed: u64,
    index_errors: u64,
}

fn purge_and_prune(engine: &dyn Engine, index: &KeyIndex) -> Result<CycleOutcome, EngineError> {
    let purged = engine.purge_expired()?;

    let mut outcome = CycleOutcome {
        purged: purged.len() as u64,
        removed: 0,
        index_errors: 0,
    };
    for key in &purged {
        let Some(raw) = RawKey::from_data_key(key) else {
            continue;
        };
        match index.remove_stale(&raw, engine) {
            Ok(true) => outcome.removed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to drop expired key from index");
                outcome.index_errors += 1;
            }
        }
    }
    Ok(outcome)
}

/// Run one purge cycle.
///
/// A key rewritten between the purge and the index update keeps its index
/// entry.
pub async fn sweep_once(engine: &Arc<dyn Engine>, index: &Arc<KeyIndex>, metrics: &SweepMetrics) {
    metrics.sweep_cycles.fetch_add(1, Ordering::Relaxed);

    let engine = Arc::clone(engine);
    let index = Arc::clone(index);
    let outcome =
        match tokio::task::spawn_blocking(move || purge_and_prune(engine.as_ref(), &index)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to purge expired entries");
                metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Expiry sweep worker panicked");
                metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

    metrics
        .entries_purged
        .fetch_add(outcome.purged, Ordering::Relaxed);
    metrics
        .index_entries_removed
        .fetch_add(outcome.removed, Ordering::Relaxed);
    metrics
        .sweep_errors
        .fetch_add(outcome.index_errors, Ordering::Relaxed);

    if outcome.purged == 0 {
        tracing::trace!("Expiry sweep found nothing to purge");
    } else {
        tracing::info!(
            purged = outcome.purged,
            removed = outcome.removed,
            "Expiry sweep cycle completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;

    #[tokio::test]
    async fn test_sweep_once_purges_engine_and_index() {
        let engine: Arc<dyn Engine> = Arc::new(MemoryEngine::new());
        let index = Arc::new(KeyIndex::new());
        let metrics = SweepMetrics::new();

        let expiring = RawKey::new(b"old".to_vec()).expect("non-empty");
        let lasting = RawKey::new(b"new".to_vec()).expect("non-empty");
        engine
            .put(&expiring.data_key(), b"a", Some(Duration::from_millis(1)), 1)
            .expect("put");
        engine
            .put(&lasting.data_key(), b"b", Some(Duration::from_secs(60)), 1)
            .expect("put");
        engine.put(b"log:1", b"c", None, 0).expect("put");
        index.insert(expiring.clone()).expect("insert");
        index.insert(lasting.clone()).expect("insert");

        tokio::time::sleep(Duration::from_millis(20)).await;
        sweep_once(&engine, &index, &metrics).await;

        assert_eq!(index.lookup(&expiring.encode()).expect("lookup"), None);
        assert!(index.lookup(&lasting.encode()).expect("lookup").is_some());
        assert_eq!(engine.entry_count().expect("count"), 2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_purged, 1);
        assert_eq!(snapshot.index_entries_removed, 1);
        assert_eq!(snapshot.sweep_cycles, 1);
        assert_eq!(snapshot.sweep_errors, 0);
    }

    #[tokio::test]
    async fn test_task_stops_on_shutdown() {
        let engine: Arc<dyn Engine> = Arc::new(MemoryEngine::new());
        let index = Arc::new(KeyIndex::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(expiry_sweep_task(
            engine,
            index,
            Duration::from_millis(5),
            Arc::new(SweepMetrics::new()),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(true).expect("send shutdown");
        let metrics = handle.await.expect("sweep task should finish");
        assert!(metrics.snapshot().sweep_cycles >= 1);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = SweepMetrics::new();
        metrics.entries_purged.store(5, Ordering::Relaxed);
        metrics.sweep_cycles.store(2, Ordering::Relaxed);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_purged, 5);
        assert_eq!(snapshot.sweep_cycles, 2);
    }

    #[tokio::test]
    async fn test_sweep_keeps_key_rewritten_after_purge() {
        use crate::engine::interleave::InterleavingEngine;

        let racing = Arc::new(InterleavingEngine::new());
        let engine: Arc<dyn Engine> = racing.clone();
        let index = Arc::new(KeyIndex::new());
        let metrics = SweepMetrics::new();

        let raw = RawKey::new(b"reused".to_vec()).expect("non-empty");
        engine
            .put(&raw.data_key(), b"old", Some(Duration::from_millis(1)), 1)
            .expect("put");
        index.insert(raw.clone()).expect("insert");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let data_key = raw.data_key();
        racing.arm(move |inner| {
            inner
                .put(&data_key, b"fresh", Some(Duration::from_secs(60)), 1)
                .expect("rewrite");
        });
        sweep_once(&engine, &index, &metrics).await;

        assert_eq!(index.lookup(&raw.encode()).expect("lookup"), Some(raw.clone()));
        let value = engine.get(&raw.data_key()).expect("get").expect("live");
        assert_eq!(value.payload, b"fresh");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_purged, 1);
        assert_eq!(snapshot.index_entries_removed, 0);
    }
}
