//! Store configuration.
//!
//! Loaded from environment variables with defaults suitable for a single
//! process; every field also has a `with_*` builder for tests and embedding.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use doccache_core::ConfigError;

use crate::engine::{Engine, EngineError, LmdbEngine, MemoryEngine};

/// Default entry lifetime: 36 hours.
pub const DEFAULT_TTL_SECS: u64 = 36 * 60 * 60;
pub const DEFAULT_INDEX_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_MAP_SIZE_MB: usize = 1024;

/// Configuration for a [`CacheStore`](crate::CacheStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// LMDB directory. `None` selects the in-memory engine.
    pub db_path: Option<PathBuf>,

    /// Lifetime of cache entries.
    pub ttl: Duration,

    /// Pending commands the indexing queue can hold.
    pub index_queue_capacity: usize,

    /// LMDB memory map size in megabytes.
    pub map_size_mb: usize,

    /// How often to purge expired entries. `None` disables the sweep.
    pub sweep_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            index_queue_capacity: DEFAULT_INDEX_QUEUE_CAPACITY,
            map_size_mb: DEFAULT_MAP_SIZE_MB,
            sweep_interval: None,
        }
    }
}

impl StoreConfig {
    /// Create StoreConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `DOCCACHE_DB_PATH`: LMDB directory (default: unset, in-memory engine)
    /// - `DOCCACHE_TTL_SECS`: Entry lifetime in seconds (default: 129600)
    /// - `DOCCACHE_INDEX_QUEUE`: Indexing queue capacity (default: 1024)
    /// - `DOCCACHE_MAP_SIZE_MB`: LMDB map size (default: 1024)
    /// - `DOCCACHE_SWEEP_INTERVAL_SECS`: Expiry sweep period (default: disabled)
    pub fn from_env() -> Self {
        let db_path = std::env::var("DOCCACHE_DB_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let ttl = Duration::from_secs(
            env_parse("DOCCACHE_TTL_SECS").unwrap_or(DEFAULT_TTL_SECS),
        );

        let index_queue_capacity =
            env_parse("DOCCACHE_INDEX_QUEUE").unwrap_or(DEFAULT_INDEX_QUEUE_CAPACITY);

        let map_size_mb = env_parse("DOCCACHE_MAP_SIZE_MB").unwrap_or(DEFAULT_MAP_SIZE_MB);

        let sweep_interval = env_parse::<u64>("DOCCACHE_SWEEP_INTERVAL_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            db_path,
            ttl,
            index_queue_capacity,
            map_size_mb,
            sweep_interval,
        }
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_index_queue_capacity(mut self, capacity: usize) -> Self {
        self.index_queue_capacity = capacity;
        self
    }

    pub fn with_map_size_mb(mut self, map_size_mb: usize) -> Self {
        self.map_size_mb = map_size_mb;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: "0".to_string(),
                reason: "entries would expire immediately".to_string(),
            });
        }
        if self.index_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "index_queue_capacity".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.db_path.is_some() && self.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "map_size_mb".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::InvalidValue {
                field: "sweep_interval".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Open the engine this configuration selects.
    pub fn open_engine(&self) -> Result<Arc<dyn Engine>, EngineError> {
        match &self.db_path {
            Some(path) => Ok(Arc::new(LmdbEngine::open(path, self.map_size_mb)?)),
            None => Ok(Arc::new(MemoryEngine::new())),
        }
    }
}

/// Parse `name` from the environment. Unset yields `None`; an unparsable
/// value is logged and also yields `None` so the caller's default applies.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(129_600));
        assert_eq!(config.index_queue_capacity, DEFAULT_INDEX_QUEUE_CAPACITY);
        assert!(config.db_path.is_none());
        assert!(config.sweep_interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = StoreConfig::default()
            .with_db_path("/tmp/doccache")
            .with_ttl(Duration::from_secs(5))
            .with_index_queue_capacity(8)
            .with_map_size_mb(16)
            .with_sweep_interval(Duration::from_secs(1));
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/doccache")));
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.index_queue_capacity, 8);
        assert_eq!(config.map_size_mb, 16);
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_ttl = StoreConfig::default().with_ttl(Duration::ZERO);
        assert!(matches!(
            zero_ttl.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "ttl"
        ));

        let zero_queue = StoreConfig::default().with_index_queue_capacity(0);
        assert!(zero_queue.validate().is_err());

        let zero_map = StoreConfig::default()
            .with_db_path("/tmp/x")
            .with_map_size_mb(0);
        assert!(zero_map.validate().is_err());
    }

    #[test]
    fn test_open_memory_engine_by_default() {
        let engine = StoreConfig::default().open_engine().expect("open engine");
        assert_eq!(engine.entry_count().expect("count"), 0);
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("DOCCACHE_TEST_ENV_PARSE_GARBAGE", "twelve");
        std::env::set_var("DOCCACHE_TEST_ENV_PARSE_PADDED", " 42 ");
        assert_eq!(env_parse::<u64>("DOCCACHE_TEST_ENV_PARSE_GARBAGE"), None);
        assert_eq!(env_parse::<u64>("DOCCACHE_TEST_ENV_PARSE_PADDED"), Some(42));
        assert_eq!(env_parse::<u64>("DOCCACHE_TEST_ENV_PARSE_UNSET"), None);
        std::env::remove_var("DOCCACHE_TEST_ENV_PARSE_GARBAGE");
        std::env::remove_var("DOCCACHE_TEST_ENV_PARSE_PADDED");
    }
}
