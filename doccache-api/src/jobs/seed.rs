//! Status Seeding Background Task
//!
//! Writes a synthetic failed [`OperationStatus`] into the cache on every
//! tick, so a fresh deployment has documents to browse through the read-only
//! item routes. Disabled unless `DOCCACHE_SEED_INTERVAL_MS` is set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use doccache_core::{FileInfo, InnerError, OperationStatus, ProcessStatus, Stage, Stages};
use doccache_storage::CacheStore;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

pub const DEFAULT_SEED_INTERVAL_MS: u64 = 500;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    /// Time between seeded records (default: 500 ms)
    pub interval: Duration,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_SEED_INTERVAL_MS),
        }
    }
}

impl SeedConfig {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct SeedMetrics {
    /// Records written since startup
    pub records_seeded: AtomicU64,

    /// Writes that failed
    pub seed_errors: AtomicU64,
}

impl SeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SeedSnapshot {
        SeedSnapshot {
            records_seeded: self.records_seeded.load(Ordering::Relaxed),
            seed_errors: self.seed_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSnapshot {
    pub records_seeded: u64,
    pub seed_errors: u64,
}

// ============================================================================
// RECORD FACTORY
// ============================================================================

fn failed_stage(now: &str) -> Stage {
    Stage {
        task: Some(ProcessStatus::Failed),
        start_time: now.to_string(),
        end_time: now.to_string(),
        message: "The request is invalid.".to_string(),
        inner_error: Some(InnerError {
            date: now.to_string(),
            code: "InvalidRequest".to_string(),
            message: "File does not meet the requirements.".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build a synthetic status record with fresh identifiers.
pub fn mock_status() -> OperationStatus {
    let now = chrono::Utc::now().to_rfc3339();
    let id = Uuid::now_v7();

    OperationStatus {
        id: id.to_string(),
        operation_id: Uuid::now_v7().to_string(),
        runtime_version: "1.0.0".to_string(),
        status: "Failed".to_string(),
        correlation_id: Uuid::now_v7().to_string(),
        file_info: Some(FileInfo {
            e_tag: "0x8D4BCC2E4835CD0".to_string(),
            content_type: "application/octet-stream".to_string(),
            content_length: 524_288,
            hash: format!("{:x}", Sha256::digest(id.as_bytes())),
        }),
        stages: Some(Stages {
            stage1: Some(failed_stage(&now)),
            stage2: Some(failed_stage(&now)),
            stage3: Some(failed_stage(&now)),
            ..Default::default()
        }),
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Seed one record per tick until shutdown is signalled.
pub async fn seed_task(
    store: CacheStore,
    config: SeedConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SeedMetrics> {
    let metrics = Arc::new(SeedMetrics::new());

    let mut seed_interval = interval(config.interval);
    seed_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_ms = config.interval.as_millis() as u64,
        "Seed task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Seed task shutting down");
                    break;
                }
            }

            _ = seed_interval.tick() => {
                seed_once(&store, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        records_seeded = snapshot.records_seeded,
        seed_errors = snapshot.seed_errors,
        "Seed task completed"
    );

    metrics
}

/// Write one record on the blocking pool and wait for it, so ticks never
/// overlap and shutdown sees every started write.
async fn seed_once(store: &CacheStore, metrics: &Arc<SeedMetrics>) {
    let status = mock_status();
    let operation_id = status.operation_id.clone();
    let counters = Arc::clone(metrics);

    let write = store.set_struct_async(status, move |result| match result {
        Ok(key) => {
            counters.records_seeded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, operation_id = %operation_id, "Seeded status record");
        }
        Err(e) => {
            counters.seed_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Failed to seed status record");
        }
    });

    if let Err(e) = write.await {
        metrics.seed_errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!(error = %e, "Seed write task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doccache_storage::StoreConfig;

    #[test]
    fn test_mock_status_shape() {
        let status = mock_status();
        assert_eq!(status.status, "Failed");
        let file_info = status.file_info.as_ref().expect("file info");
        assert_eq!(file_info.hash.len(), 64);
        let stages = status.stages.expect("stages");
        assert!(stages.stage1.is_some() && stages.stage3.is_some());
        assert!(stages.stage4.is_none());
    }

    #[tokio::test]
    async fn test_seed_task_writes_until_shutdown() {
        let store = CacheStore::open_with_config(StoreConfig::default())
            .await
            .expect("open store");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(seed_task(
            store.clone(),
            SeedConfig::new(Duration::from_millis(5)),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        shutdown_tx.send(true).expect("send shutdown");
        let metrics = handle.await.expect("seed task should finish").snapshot();

        assert!(metrics.records_seeded >= 1);
        assert_eq!(metrics.seed_errors, 0);
        assert_eq!(store.count().expect("count") as u64, metrics.records_seeded);

        let key = store.list().expect("list").remove(0);
        let seeded: OperationStatus = store.get_struct(&key).expect("decode seeded record");
        assert_eq!(seeded.runtime_version, "1.0.0");
    }

    #[tokio::test]
    async fn test_seed_once_records_write() {
        let store = CacheStore::open_with_config(StoreConfig::default())
            .await
            .expect("open store");
        let metrics = Arc::new(SeedMetrics::new());

        seed_once(&store, &metrics).await;
        seed_once(&store, &metrics).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_seeded, 2);
        assert_eq!(snapshot.seed_errors, 0);
        assert_eq!(store.count().expect("count"), 2);
    }
}
