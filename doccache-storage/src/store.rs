//! Key-indexed cache store.
//!
//! [`CacheStore`] ties the engine, the key index and the background tasks
//! together behind one cheaply cloneable handle.
//!
//! # Visibility
//!
//! `set` registers its key in the index before returning, so a returned
//! token resolves immediately. Keys found by the startup reload are indexed
//! asynchronously; `open` returns once all of them are queued, and
//! [`CacheStore::sync_index`] waits until they are applied.
//!
//! # Consistency
//!
//! The engine write and the index update are separate steps. A crash in
//! between leaves an engine entry the index does not know about until the
//! next reload. A lookup that finds its engine entry gone removes the stale
//! index entry and reports `KeyNotFound`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use doccache_core::{DocCacheError, DocCacheResult, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::StoreConfig;
use crate::engine::Engine;
use crate::index::{indexer_task, IndexQueue, IndexerMetrics, IndexerSnapshot, KeyIndex};
use crate::key::{log_key, EncodedKey, Namespace, RawKey};
use crate::sweep::{expiry_sweep_task, SweepMetrics, SweepSnapshot};

/// Meta byte attached to data-namespace entries.
const DATA_META: u8 = 1;

fn not_found(key: impl Into<String>) -> DocCacheError {
    StorageError::KeyNotFound { key: key.into() }.into()
}

struct Inner {
    engine: Arc<dyn Engine>,
    index: Arc<KeyIndex>,
    queue: IndexQueue,
    config: StoreConfig,
    last_log_index: Mutex<Option<u64>>,
    shutdown_tx: watch::Sender<bool>,
    indexer: Mutex<Option<JoinHandle<Arc<IndexerMetrics>>>>,
    sweeper: Mutex<Option<JoinHandle<Arc<SweepMetrics>>>>,
    sweep_metrics: Arc<SweepMetrics>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Document cache over an embedded engine.
///
/// # Example
///
/// ```ignore
/// use doccache_storage::{CacheStore, StoreConfig};
///
/// let config = StoreConfig::from_env();
/// let store = CacheStore::open(config.open_engine()?, config).await?;
///
/// let token = store.set(b"hello world")?;
/// assert_eq!(store.get(&token)?, b"hello world");
/// ```
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Open a store over `engine`, start its background tasks and queue
    /// every live data key for indexing.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn open(engine: Arc<dyn Engine>, config: StoreConfig) -> DocCacheResult<Self> {
        config.validate()?;

        let index = Arc::new(KeyIndex::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (queue, rx) = IndexQueue::new(config.index_queue_capacity);
        let indexer = tokio::spawn(indexer_task(
            Arc::clone(&index),
            rx,
            queue.metrics(),
            shutdown_rx.clone(),
        ));

        let sweep_metrics = Arc::new(SweepMetrics::new());
        let sweeper = config.sweep_interval.map(|period| {
            tokio::spawn(expiry_sweep_task(
                Arc::clone(&engine),
                Arc::clone(&index),
                period,
                Arc::clone(&sweep_metrics),
                shutdown_rx.clone(),
            ))
        });

        let store = Self {
            inner: Arc::new(Inner {
                engine,
                index,
                queue,
                config,
                last_log_index: Mutex::new(None),
                shutdown_tx,
                indexer: Mutex::new(Some(indexer)),
                sweeper: Mutex::new(sweeper),
                sweep_metrics,
            }),
        };

        store.reload().await?;
        Ok(store)
    }

    /// Open the engine selected by `config`, then the store.
    pub async fn open_with_config(config: StoreConfig) -> DocCacheResult<Self> {
        config.validate()?;
        let engine = config.open_engine()?;
        Self::open(engine, config).await
    }

    /// Queue every live data-namespace key for indexing.
    ///
    /// Keys are stamped with the index generation read before the scan, so a
    /// `delete_all` that lands while they are still queued discards them.
    pub async fn reload(&self) -> DocCacheResult<()> {
        let generation = self.inner.index.generation()?;
        let engine = Arc::clone(&self.inner.engine);
        let entries =
            tokio::task::spawn_blocking(move || engine.scan_prefix(Namespace::Data.prefix()))
                .await
                .map_err(|e| StorageError::Engine {
                    reason: format!("reload scan failed: {}", e),
                })??;

        let mut queued = 0usize;
        let mut skipped = 0usize;
        for entry in entries {
            if entry.is_deleted_or_expired {
                skipped += 1;
                continue;
            }
            let Some(raw) = RawKey::from_data_key(&entry.key) else {
                skipped += 1;
                continue;
            };
            self.inner.queue.enqueue_wait(raw, generation).await?;
            queued += 1;
        }

        tracing::info!(queued, skipped, "Queued stored keys for indexing");
        Ok(())
    }

    /// Wait until every key queued so far has been indexed.
    pub async fn sync_index(&self) -> DocCacheResult<()> {
        self.inner.queue.flush().await?;
        Ok(())
    }

    /// Queue a raw key for asynchronous indexing without waiting. Returns
    /// `false` when the queue is full and the key was dropped.
    pub fn enqueue_index(&self, raw: RawKey) -> bool {
        match self.inner.index.generation() {
            Ok(generation) => self.inner.queue.enqueue(raw, generation),
            Err(e) => {
                tracing::warn!(error = %e, "Index unavailable, dropping key");
                false
            }
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // ========================================================================
    // DATA NAMESPACE
    // ========================================================================

    /// Store `value` under a fresh random key and return its token.
    pub fn set(&self, value: &[u8]) -> DocCacheResult<EncodedKey> {
        let raw = RawKey::generate()?;
        self.set_with_key(raw, value)
    }

    /// Store `value` under a caller-chosen key. Reusing a key overwrites the
    /// previous value and yields the same token.
    pub fn set_with_key(&self, raw: RawKey, value: &[u8]) -> DocCacheResult<EncodedKey> {
        self.inner.engine.put(
            &raw.data_key(),
            value,
            Some(self.inner.config.ttl),
            DATA_META,
        )?;

        let token = raw.encode();
        self.inner.index.insert(raw)?;
        tracing::debug!(key = %token, bytes = value.len(), "Stored entry");
        Ok(token)
    }

    /// Fetch the value behind `key`.
    ///
    /// Unknown and expired tokens both fail with `KeyNotFound`.
    pub fn get(&self, key: &EncodedKey) -> DocCacheResult<Vec<u8>> {
        let raw = self
            .inner
            .index
            .lookup(key)?
            .ok_or_else(|| not_found(key.as_str()))?;

        match self.inner.engine.get(&raw.data_key())? {
            Some(value) => Ok(value.payload),
            None => {
                if self
                    .inner
                    .index
                    .remove_stale(&raw, self.inner.engine.as_ref())?
                {
                    tracing::debug!(key = %key, "Dropped stale index entry");
                }
                Err(not_found(key.as_str()))
            }
        }
    }

    /// [`get`](Self::get) for an unvalidated token string.
    pub fn get_by_token(&self, token: &str) -> DocCacheResult<Vec<u8>> {
        let key = Self::resolve_token(token)?;
        self.get(&key)
    }

    /// Validate an external token. Malformed tokens are reported as
    /// `KeyNotFound`, the same as tokens that were never issued.
    pub fn resolve_token(token: &str) -> DocCacheResult<EncodedKey> {
        EncodedKey::parse(token).ok_or_else(|| not_found(token))
    }

    /// Remove the entry behind `key`.
    ///
    /// An index miss fails without touching the engine. If the engine entry
    /// had already expired, the index entry is still removed and
    /// `KeyNotFound` is returned. A concurrent rewrite of the same raw key
    /// that lands during the delete stays indexed.
    pub fn delete(&self, key: &EncodedKey) -> DocCacheResult<()> {
        let raw = self
            .inner
            .index
            .lookup(key)?
            .ok_or_else(|| not_found(key.as_str()))?;

        let removed = self.inner.engine.delete(&raw.data_key())?;
        self.inner
            .index
            .remove_stale(&raw, self.inner.engine.as_ref())?;

        if removed {
            tracing::debug!(key = %key, "Deleted entry");
            Ok(())
        } else {
            Err(not_found(key.as_str()))
        }
    }

    /// Wipe the engine (both namespaces) and reset the index. If the engine
    /// wipe fails the index is left as it was. Keys still queued from a
    /// reload are discarded rather than re-added.
    pub fn delete_all(&self) -> DocCacheResult<()> {
        let dropped = self.inner.engine.drop_all()?;
        self.inner.index.clear()?;
        *self
            .inner
            .last_log_index
            .lock()
            .map_err(|_| StorageError::LockPoisoned)? = None;

        tracing::info!(dropped, "Dropped all entries");
        Ok(())
    }

    /// All indexed tokens, sorted.
    pub fn list(&self) -> DocCacheResult<Vec<EncodedKey>> {
        Ok(self.inner.index.keys()?)
    }

    /// Owned copy of the token to raw key mapping.
    pub fn snapshot(&self) -> DocCacheResult<HashMap<EncodedKey, RawKey>> {
        Ok(self.inner.index.snapshot()?)
    }

    /// Number of indexed entries.
    pub fn count(&self) -> DocCacheResult<usize> {
        Ok(self.inner.index.len()?)
    }

    // ========================================================================
    // STRUCTURED VALUES
    // ========================================================================

    /// Serialize `value` as JSON and store it.
    pub fn set_struct<T: Serialize + ?Sized>(&self, value: &T) -> DocCacheResult<EncodedKey> {
        let bytes = serde_json::to_vec(value).map_err(|e| StorageError::Serialization {
            reason: e.to_string(),
        })?;
        self.set(&bytes)
    }

    /// Fetch and deserialize a JSON value stored with [`set_struct`](Self::set_struct).
    pub fn get_struct<T: DeserializeOwned>(&self, key: &EncodedKey) -> DocCacheResult<T> {
        let bytes = self.get(key)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Serialization {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Run [`set_struct`](Self::set_struct) on the blocking pool and hand the
    /// outcome to `callback` exactly once.
    ///
    /// Completion is unordered relative to the caller's later operations;
    /// await the handle or synchronize in the callback when order matters.
    /// Must be called from within a Tokio runtime.
    pub fn set_struct_async<T, F>(&self, value: T, callback: F) -> JoinHandle<()>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(DocCacheResult<EncodedKey>) + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let result = store.set_struct(&value);
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Asynchronous store failed");
            }
            callback(result);
        })
    }

    // ========================================================================
    // LOG NAMESPACE
    // ========================================================================

    /// Write a log entry. Log entries never expire and are not indexed.
    pub fn put_log_entry(&self, index: u64, value: &[u8]) -> DocCacheResult<()> {
        self.inner.engine.put(&log_key(index), value, None, 0)?;
        *self
            .inner
            .last_log_index
            .lock()
            .map_err(|_| StorageError::LockPoisoned)? = Some(index);
        Ok(())
    }

    pub fn get_log_entry(&self, index: u64) -> DocCacheResult<Vec<u8>> {
        match self.inner.engine.get(&log_key(index))? {
            Some(value) => Ok(value.payload),
            None => Err(not_found(format!("log:{}", index))),
        }
    }

    /// Index of the most recent log entry written through this store.
    pub fn last_log_index(&self) -> DocCacheResult<Option<u64>> {
        Ok(*self
            .inner
            .last_log_index
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?)
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub fn indexer_metrics(&self) -> IndexerSnapshot {
        self.inner.queue.metrics().snapshot()
    }

    pub fn sweep_metrics(&self) -> SweepSnapshot {
        self.inner.sweep_metrics.snapshot()
    }

    /// Stop the background tasks and wait for them to finish. Keys still
    /// queued for indexing are discarded. The engine remains usable through
    /// other clones of this handle, but nothing further is indexed
    /// asynchronously.
    pub async fn close(&self) {
        let _ = self.inner.shutdown_tx.send(true);

        let indexer = self.inner.indexer.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = indexer {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Indexer task failed");
            }
        }

        let sweeper = self.inner.sweeper.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Expiry sweep task failed");
            }
        }

        tracing::info!("Cache store closed");
    }
}
