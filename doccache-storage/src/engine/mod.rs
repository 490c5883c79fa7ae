//! Embedded engine abstraction.
//!
//! The cache talks to its backing store through the synchronous [`Engine`]
//! trait. Each call is one engine transaction. TTL is carried in the
//! [`StoredValue`] header rather than by the engine itself, so expired
//! entries stay on disk until [`Engine::purge_expired`] reclaims them but
//! are never returned by [`Engine::get`].

mod lmdb;
mod memory;
mod value;

pub use lmdb::LmdbEngine;
pub use memory::MemoryEngine;
pub use value::{now_ms, StoredValue, FORMAT_VERSION, HEADER_LEN};

use std::time::Duration;

use doccache_core::{DocCacheError, StorageError};

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Failed to open or create the environment.
    #[error("Failed to open engine environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored bytes do not form a valid value envelope.
    #[error("Corrupt value: {0}")]
    Corrupt(String),

    /// In-process engine lock poisoned.
    #[error("Engine lock poisoned")]
    LockPoisoned,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for StorageError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::LockPoisoned => StorageError::LockPoisoned,
            other => StorageError::Engine {
                reason: other.to_string(),
            },
        }
    }
}

impl From<EngineError> for DocCacheError {
    fn from(e: EngineError) -> Self {
        DocCacheError::Storage(e.into())
    }
}

/// One key visited by [`Engine::scan_prefix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub key: Vec<u8>,
    pub is_deleted_or_expired: bool,
}

/// Byte-keyed, ordered, transactional store.
pub trait Engine: Send + Sync + 'static {
    /// Live value under `key`, or `None` when missing or expired.
    fn get(&self, key: &[u8]) -> Result<Option<StoredValue>, EngineError>;

    /// Write `value` under `key`, replacing any previous entry. `None` TTL
    /// means the entry never expires.
    fn put(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
        meta: u8,
    ) -> Result<(), EngineError>;

    /// Remove `key`. Returns whether a live entry was removed.
    fn delete(&self, key: &[u8]) -> Result<bool, EngineError>;

    /// Every key starting with `prefix`, in key order, flagged when stale.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<ScanEntry>, EngineError>;

    /// Remove every entry in every namespace. Returns how many were removed.
    fn drop_all(&self) -> Result<u64, EngineError>;

    /// Remove expired or undecodable entries. Returns the removed keys.
    fn purge_expired(&self) -> Result<Vec<Vec<u8>>, EngineError>;

    /// Number of stored entries, including ones not yet purged.
    fn entry_count(&self) -> Result<u64, EngineError>;
}

/// Behavior every [`Engine`] implementation must share.
#[cfg(test)]
pub(crate) mod contract {
    use super::*;

    pub fn put_get_delete(engine: &dyn Engine) {
        engine
            .put(b"dat:a", b"one", Some(Duration::from_secs(60)), 1)
            .expect("put should succeed");
        let value = engine.get(b"dat:a").expect("get should succeed");
        let value = value.expect("value should be present");
        assert_eq!(value.payload, b"one");
        assert_eq!(value.meta, 1);

        engine
            .put(b"dat:a", b"two", None, 1)
            .expect("overwrite should succeed");
        let value = engine.get(b"dat:a").expect("get should succeed");
        assert_eq!(value.map(|v| v.payload), Some(b"two".to_vec()));

        assert!(engine.delete(b"dat:a").expect("delete should succeed"));
        assert!(!engine.delete(b"dat:a").expect("delete should succeed"));
        assert!(engine.get(b"dat:a").expect("get should succeed").is_none());
    }

    pub fn expired_entries_hidden(engine: &dyn Engine) {
        engine
            .put(b"dat:gone", b"x", Some(Duration::from_millis(1)), 1)
            .expect("put should succeed");
        engine
            .put(b"dat:kept", b"y", Some(Duration::from_secs(60)), 1)
            .expect("put should succeed");
        std::thread::sleep(Duration::from_millis(20));

        assert!(engine.get(b"dat:gone").expect("get should succeed").is_none());
        assert!(!engine.delete(b"dat:gone").expect("delete should succeed"));

        engine
            .put(b"dat:gone2", b"x", Some(Duration::from_millis(1)), 1)
            .expect("put should succeed");
        std::thread::sleep(Duration::from_millis(20));

        let scanned = engine.scan_prefix(b"dat:").expect("scan should succeed");
        let flags: Vec<(Vec<u8>, bool)> = scanned
            .into_iter()
            .map(|e| (e.key, e.is_deleted_or_expired))
            .collect();
        assert_eq!(
            flags,
            vec![(b"dat:gone2".to_vec(), true), (b"dat:kept".to_vec(), false)]
        );

        let purged = engine.purge_expired().expect("purge should succeed");
        assert_eq!(purged, vec![b"dat:gone2".to_vec()]);
        assert_eq!(engine.entry_count().expect("count should succeed"), 1);
    }

    pub fn scan_respects_namespaces(engine: &dyn Engine) {
        engine.put(b"dat:1", b"a", None, 1).expect("put");
        engine.put(b"log:1", b"b", None, 0).expect("put");
        engine.put(b"dat:2", b"c", None, 1).expect("put");

        let keys: Vec<Vec<u8>> = engine
            .scan_prefix(b"dat:")
            .expect("scan should succeed")
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec![b"dat:1".to_vec(), b"dat:2".to_vec()]);

        assert_eq!(engine.drop_all().expect("drop_all should succeed"), 3);
        assert_eq!(engine.entry_count().expect("count should succeed"), 0);
        assert!(engine.get(b"log:1").expect("get should succeed").is_none());
    }
}
