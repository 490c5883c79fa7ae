//! In-memory key index and its background indexer.
//!
//! [`KeyIndex`] maps tokens back to raw engine keys. Writers register keys
//! directly; bulk registration (the startup reload) goes through a bounded
//! queue drained by a single indexer task, so a large key space never holds
//! the index lock for long.
//!
//! Every [`KeyIndex::clear`] starts a new generation. Queued keys carry the
//! generation they were read under, and the indexer discards keys from an
//! earlier one, so a wipe is never undone by work that was still queued.
//!
//! The lock guards in-memory state only and is never held across engine I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use doccache_core::StorageError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

use crate::engine::Engine;
use crate::key::{EncodedKey, RawKey};

// ============================================================================
// INDEX
// ============================================================================

#[derive(Debug, Default)]
struct IndexState {
    entries: HashMap<EncodedKey, RawKey>,
    generation: u64,
}

/// Result of a generation-checked insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added,
    AlreadyPresent,
    /// The index was cleared after the key was queued.
    Superseded,
}

/// Token to raw key mapping.
#[derive(Debug, Default)]
pub struct KeyIndex {
    state: Mutex<IndexState>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, IndexState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Current clear generation.
    pub fn generation(&self) -> Result<u64, StorageError> {
        Ok(self.state()?.generation)
    }

    /// Register a raw key. Returns `false` if its token was already present.
    pub fn insert(&self, raw: RawKey) -> Result<bool, StorageError> {
        let encoded = raw.encode();
        let mut state = self.state()?;
        if state.entries.contains_key(&encoded) {
            return Ok(false);
        }
        state.entries.insert(encoded, raw);
        Ok(true)
    }

    /// Register a raw key read under `generation`, unless the index has been
    /// cleared since.
    pub fn insert_at(&self, raw: RawKey, generation: u64) -> Result<InsertOutcome, StorageError> {
        let encoded = raw.encode();
        let mut state = self.state()?;
        if state.generation != generation {
            return Ok(InsertOutcome::Superseded);
        }
        if state.entries.contains_key(&encoded) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        state.entries.insert(encoded, raw);
        Ok(InsertOutcome::Added)
    }

    pub fn lookup(&self, key: &EncodedKey) -> Result<Option<RawKey>, StorageError> {
        Ok(self.state()?.entries.get(key).cloned())
    }

    pub fn remove(&self, key: &EncodedKey) -> Result<Option<RawKey>, StorageError> {
        Ok(self.state()?.entries.remove(key))
    }

    /// Drop the entry for `raw` after its engine entry was found missing.
    ///
    /// A writer that reuses `raw` in the meantime sees the token still
    /// indexed and skips registration, so the engine is read again after the
    /// removal and the entry restored if it is live. Returns whether the
    /// entry stayed removed.
    pub fn remove_stale(&self, raw: &RawKey, engine: &dyn Engine) -> Result<bool, StorageError> {
        if self.remove(&raw.encode())?.is_none() {
            return Ok(false);
        }
        if engine.get(&raw.data_key())?.is_some() {
            self.insert(raw.clone())?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Owned copy of the whole mapping.
    pub fn snapshot(&self) -> Result<HashMap<EncodedKey, RawKey>, StorageError> {
        Ok(self.state()?.entries.clone())
    }

    /// All tokens, sorted.
    pub fn keys(&self) -> Result<Vec<EncodedKey>, StorageError> {
        let mut keys: Vec<EncodedKey> = self.state()?.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.state()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.state()?.entries.is_empty())
    }

    /// Remove every entry and start a new generation.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut state = self.state()?;
        state.entries.clear();
        state.generation += 1;
        Ok(())
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for indexer activity.
#[derive(Debug, Default)]
pub struct IndexerMetrics {
    /// Keys newly added to the index
    pub indexed: AtomicU64,

    /// Keys that were already present
    pub duplicates: AtomicU64,

    /// Keys rejected because the queue was full or closed
    pub dropped: AtomicU64,

    /// Keys discarded because the index was cleared after they were queued
    pub superseded: AtomicU64,

    /// Keys that failed to index
    pub errors: AtomicU64,
}

impl IndexerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IndexerSnapshot {
        IndexerSnapshot {
            indexed: self.indexed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IndexerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerSnapshot {
    pub indexed: u64,
    pub duplicates: u64,
    pub dropped: u64,
    pub superseded: u64,
    pub errors: u64,
}

// ============================================================================
// QUEUE
// ============================================================================

/// Work items for the indexer task.
#[derive(Debug)]
pub enum IndexCommand {
    /// Add a raw key read under the given index generation.
    Index { raw: RawKey, generation: u64 },
    /// Acknowledge once every earlier command has been applied.
    Flush(oneshot::Sender<()>),
}

/// Producer side of the indexing queue.
#[derive(Debug, Clone)]
pub struct IndexQueue {
    tx: mpsc::Sender<IndexCommand>,
    metrics: Arc<IndexerMetrics>,
}

impl IndexQueue {
    /// Create a queue with room for `capacity` pending commands.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<IndexCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        let queue = Self {
            tx,
            metrics: Arc::new(IndexerMetrics::new()),
        };
        (queue, rx)
    }

    pub fn metrics(&self) -> Arc<IndexerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Queue a key without waiting. When the queue is full or the indexer
    /// has stopped, the key is dropped with a warning and `false` is
    /// returned; it will be picked up again by the next startup reload.
    pub fn enqueue(&self, raw: RawKey, generation: u64) -> bool {
        match self.tx.try_send(IndexCommand::Index { raw, generation }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Index queue full, dropping key");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Indexer stopped, dropping key");
                false
            }
        }
    }

    /// Queue a key, waiting for capacity.
    pub async fn enqueue_wait(&self, raw: RawKey, generation: u64) -> Result<(), StorageError> {
        self.tx
            .send(IndexCommand::Index { raw, generation })
            .await
            .map_err(|_| StorageError::Closed)
    }

    /// Wait until everything queued before this call has been indexed.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(IndexCommand::Flush(done_tx))
            .await
            .map_err(|_| StorageError::Closed)?;
        done_rx.await.map_err(|_| StorageError::Closed)
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Drain the indexing queue until shutdown is signalled or every producer
/// is gone. Returns the metrics it recorded into.
pub async fn indexer_task(
    index: Arc<KeyIndex>,
    mut rx: mpsc::Receiver<IndexCommand>,
    metrics: Arc<IndexerMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<IndexerMetrics> {
    tracing::debug!("Indexer task started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::debug!("Indexer task shutting down");
                    break;
                }
            }

            command = rx.recv() => match command {
                Some(IndexCommand::Index { raw, generation }) => {
                    apply(&index, raw, generation, &metrics)
                }
                Some(IndexCommand::Flush(done)) => {
                    let _ = done.send(());
                }
                None => break,
            },
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        indexed = snapshot.indexed,
        duplicates = snapshot.duplicates,
        dropped = snapshot.dropped,
        superseded = snapshot.superseded,
        errors = snapshot.errors,
        "Indexer task completed"
    );

    metrics
}

fn apply(index: &KeyIndex, raw: RawKey, generation: u64, metrics: &IndexerMetrics) {
    match index.insert_at(raw, generation) {
        Ok(InsertOutcome::Added) => {
            metrics.indexed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(InsertOutcome::AlreadyPresent) => {
            metrics.duplicates.fetch_add(1, Ordering::Relaxed);
        }
        Ok(InsertOutcome::Superseded) => {
            metrics.superseded.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to index key");
            metrics.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}
