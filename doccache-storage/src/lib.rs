//! doccache storage - key-indexed document cache
//!
//! An embedded key-value engine (LMDB via `heed`, or in-memory) fronted by
//! an in-memory token index. Values are addressed by opaque 27-character
//! tokens derived from random raw keys and expire after a configurable TTL.

pub mod config;
pub mod engine;
pub mod index;
pub mod key;
pub mod store;
pub mod sweep;

pub use config::StoreConfig;
pub use engine::{Engine, EngineError, LmdbEngine, MemoryEngine, ScanEntry, StoredValue};
pub use index::{IndexerMetrics, IndexerSnapshot, InsertOutcome, KeyIndex};
pub use key::{log_key, EncodedKey, Namespace, RawKey, ENCODED_KEY_LEN, RAW_KEY_LEN};
pub use store::CacheStore;
pub use sweep::{SweepMetrics, SweepSnapshot};
