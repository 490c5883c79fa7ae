//! Key derivation and engine key namespacing.
//!
//! A [`RawKey`] is what the engine stores under; an [`EncodedKey`] is the
//! 27-character token handed to callers. The encoding is one-way:
//! SHA-256 of the raw bytes, base58 (Bitcoin alphabet), upper-cased, first
//! 27 characters. Only the key index maps a token back to its raw key.

use std::fmt;

use doccache_core::StorageError;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Length of generated raw keys in bytes.
pub const RAW_KEY_LEN: usize = 10;

/// Length of an encoded key in characters.
pub const ENCODED_KEY_LEN: usize = 27;

const DATA_PREFIX: &[u8] = b"dat:";
const LOG_PREFIX: &[u8] = b"log:";

/// Engine key namespaces. Prefixes are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Token-addressed cache entries.
    Data,
    /// Sequentially indexed log entries.
    Log,
}

impl Namespace {
    pub fn prefix(&self) -> &'static [u8] {
        match self {
            Namespace::Data => DATA_PREFIX,
            Namespace::Log => LOG_PREFIX,
        }
    }
}

/// Raw engine key (without namespace prefix).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawKey(Vec<u8>);

impl RawKey {
    /// Wrap caller-supplied bytes. Empty keys are rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, StorageError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(StorageError::InvalidKey {
                reason: "raw key must not be empty".to_string(),
            });
        }
        Ok(Self(bytes))
    }

    /// Draw [`RAW_KEY_LEN`] bytes from the OS random source.
    pub fn generate() -> Result<Self, StorageError> {
        let mut bytes = vec![0u8; RAW_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| StorageError::Entropy {
                reason: e.to_string(),
            })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn encode(&self) -> EncodedKey {
        EncodedKey::derive(self)
    }

    /// Engine key for this raw key in the data namespace.
    pub fn data_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(DATA_PREFIX.len() + self.0.len());
        key.extend_from_slice(DATA_PREFIX);
        key.extend_from_slice(&self.0);
        key
    }

    /// Recover a raw key from a data-namespace engine key.
    pub fn from_data_key(engine_key: &[u8]) -> Option<Self> {
        engine_key
            .strip_prefix(DATA_PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(|rest| Self(rest.to_vec()))
    }
}

impl fmt::Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawKey({} bytes)", self.0.len())
    }
}

/// Engine key for a log entry: `"log:" + decimal(index)`.
pub fn log_key(index: u64) -> Vec<u8> {
    let mut key = LOG_PREFIX.to_vec();
    key.extend_from_slice(index.to_string().as_bytes());
    key
}

/// Opaque 27-character token identifying a cached document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedKey(String);

impl EncodedKey {
    /// Deterministic token for a raw key.
    pub fn derive(raw: &RawKey) -> Self {
        let digest = Sha256::digest(raw.as_bytes());
        let mut encoded = bs58::encode(digest).into_string();
        encoded.make_ascii_uppercase();
        encoded.truncate(ENCODED_KEY_LEN);
        Self(encoded)
    }

    /// Validate an externally supplied token. Returns `None` when the token
    /// could not have been produced by [`EncodedKey::derive`].
    pub fn parse(token: &str) -> Option<Self> {
        let well_formed = token.len() == ENCODED_KEY_LEN
            && token
                .bytes()
                .all(|b| matches!(b, b'1'..=b'9' | b'A'..=b'Z'));
        well_formed.then(|| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
