//! Error types for doccache operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    #[error("Engine failure: {reason}")]
    Engine { reason: String },

    #[error("Entropy source unavailable: {reason}")]
    Entropy { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Invalid raw key: {reason}")]
    InvalidKey { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Store is closed")]
    Closed,
}

/// Envelope protocol errors (signing, verification, sealing, opening).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Decode error in {field}: {reason}")]
    Decode { field: String, reason: String },

    #[error("Signature is invalid")]
    SignatureInvalid,

    #[error("Authentication failed: ciphertext rejected")]
    AuthenticationFailed,

    #[error("Signing failed: {reason}")]
    Signing { reason: String },

    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },

    #[error("Document has no cleartext payload")]
    MissingPayload,

    #[error("Invalid envelope state: expected {expected}, document is {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Envelope serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Entropy source unavailable: {reason}")]
    Entropy { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all doccache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocCacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl DocCacheError {
    /// True for index misses and stale/expired entries.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocCacheError::Storage(StorageError::KeyNotFound { .. }))
    }
}

/// Result type alias for doccache operations.
pub type DocCacheResult<T> = Result<T, DocCacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_key_not_found() {
        let err = StorageError::KeyNotFound {
            key: "ABCDEFGHJKLMNPQRSTUVWXYZ123".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Key not found"));
        assert!(msg.contains("ABCDEFGHJKLMNPQRSTUVWXYZ123"));
    }

    #[test]
    fn test_envelope_error_display_decode() {
        let err = EnvelopeError::Decode {
            field: "signature".to_string(),
            reason: "invalid base58 character".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("signature"));
        assert!(msg.contains("invalid base58"));
    }

    #[test]
    fn test_envelope_error_display_invalid_state() {
        let err = EnvelopeError::InvalidState {
            expected: "sealed".to_string(),
            actual: "plain".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("expected sealed"));
        assert!(msg.contains("plain"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "DOCCACHE_TTL_SECS".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("DOCCACHE_TTL_SECS"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_doccache_error_from_variants() {
        let storage = DocCacheError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, DocCacheError::Storage(_)));

        let envelope = DocCacheError::from(EnvelopeError::SignatureInvalid);
        assert!(matches!(envelope, DocCacheError::Envelope(_)));

        let config = DocCacheError::from(ConfigError::InvalidValue {
            field: "DOCCACHE_BACKEND".to_string(),
            value: "redis".to_string(),
            reason: "expected lmdb or memory".to_string(),
        });
        assert!(matches!(config, DocCacheError::Config(_)));
    }

    #[test]
    fn test_is_not_found() {
        let miss = DocCacheError::from(StorageError::KeyNotFound {
            key: "X".to_string(),
        });
        assert!(miss.is_not_found());

        let engine = DocCacheError::from(StorageError::Engine {
            reason: "disk full".to_string(),
        });
        assert!(!engine.is_not_found());
    }

    #[test]
    fn test_storage_error_display_lock_poisoned() {
        let msg = format!("{}", StorageError::LockPoisoned);
        assert!(msg.contains("lock poisoned"));
    }
}
