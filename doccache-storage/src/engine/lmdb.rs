//! LMDB-backed engine.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a durable,
//! memory-mapped, ordered key-value store. A single unnamed database holds
//! every namespace; keys are raw bytes and values are [`StoredValue`]
//! envelopes.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The engine uses:
//! - Read transactions for `get`, `scan_prefix` and `entry_count`
//! - Write transactions for `put`, `delete`, `drop_all` and `purge_expired`

use std::path::Path;
use std::time::Duration;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::{now_ms, Engine, EngineError, ScanEntry, StoredValue};

/// Durable engine over an LMDB environment directory.
///
/// # Example
///
/// ```ignore
/// use doccache_storage::engine::{Engine, LmdbEngine};
///
/// let engine = LmdbEngine::open("/var/lib/doccache", 1024)?;
/// engine.put(b"dat:k", b"v", None, 1)?;
/// ```
pub struct LmdbEngine {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbEngine {
    /// Open (or create) an LMDB environment at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `map_size_mb` - Maximum size of the memory map in megabytes
    pub fn open<P: AsRef<Path>>(path: P, map_size_mb: usize) -> Result<Self, EngineError> {
        let map_size = map_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            EngineError::EnvOpen(format!("map size of {} MB overflows usize", map_size_mb))
        })?;
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| EngineError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| EngineError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), map_size_mb, "Opened LMDB engine");

        Ok(Self { env, db })
    }
}

impl Engine for LmdbEngine {
    fn get(&self, key: &[u8]) -> Result<Option<StoredValue>, EngineError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        match self.db.get(&rtxn, key) {
            Ok(Some(bytes)) => {
                let value = StoredValue::decode(bytes)?;
                if value.is_expired_at(now_ms()) {
                    Ok(None)
                } else {
                    Ok(Some(value))
                }
            }
            Ok(None) => Ok(None),
            Err(e) => Err(EngineError::Transaction(e.to_string())),
        }
    }

    fn put(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
        meta: u8,
    ) -> Result<(), EngineError> {
        let stored = StoredValue::new(value.to_vec(), ttl, meta, now_ms()).encode();

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key, &stored)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<bool, EngineError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let live = match self
            .db
            .get(&wtxn, key)
            .map_err(|e| EngineError::Transaction(e.to_string()))?
        {
            Some(bytes) => !StoredValue::is_stale(bytes, now_ms()),
            None => false,
        };

        self.db
            .delete(&mut wtxn, key)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        Ok(live)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<ScanEntry>, EngineError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let now = now_ms();
        let iter = self
            .db
            .prefix_iter(&rtxn, prefix)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let mut entries = Vec::new();
        for result in iter {
            let (key, bytes) = result.map_err(|e| EngineError::Transaction(e.to_string()))?;
            entries.push(ScanEntry {
                key: key.to_vec(),
                is_deleted_or_expired: StoredValue::is_stale(bytes, now),
            });
        }

        Ok(entries)
    }

    fn drop_all(&self) -> Result<u64, EngineError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let count = self
            .db
            .len(&wtxn)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        self.db
            .clear(&mut wtxn)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        Ok(count)
    }

    fn purge_expired(&self) -> Result<Vec<Vec<u8>>, EngineError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let now = now_ms();
        let mut stale = Vec::new();
        {
            let iter = self
                .db
                .iter(&wtxn)
                .map_err(|e| EngineError::Transaction(e.to_string()))?;
            for result in iter {
                let (key, bytes) = result.map_err(|e| EngineError::Transaction(e.to_string()))?;
                if StoredValue::is_stale(bytes, now) {
                    stale.push(key.to_vec());
                }
            }
        }

        for key in &stale {
            self.db
                .delete(&mut wtxn, key)
                .map_err(|e| EngineError::Transaction(e.to_string()))?;
        }

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        Ok(stale)
    }

    fn entry_count(&self) -> Result<u64, EngineError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        self.db
            .len(&rtxn)
            .map_err(|e| EngineError::Transaction(e.to_string()))
    }
}
