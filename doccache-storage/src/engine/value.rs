//! On-disk value envelope.
//!
//! Every engine stores values as an 18-byte header followed by the payload:
//!
//! ```text
//! [version: u8][meta: u8][created_at_ms: i64 LE][expires_at_ms: i64 LE][payload...]
//! ```
//!
//! `expires_at_ms == 0` means the entry never expires.

use std::time::Duration;

use super::EngineError;

pub const FORMAT_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 18;

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub meta: u8,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    pub payload: Vec<u8>,
}

impl StoredValue {
    pub fn new(payload: Vec<u8>, ttl: Option<Duration>, meta: u8, now_ms: i64) -> Self {
        let expires_at_ms = match ttl {
            Some(ttl) => now_ms.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)),
            None => 0,
        };
        Self {
            meta,
            created_at_ms: now_ms,
            expires_at_ms,
            payload,
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms != 0 && self.expires_at_ms <= now_ms
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.push(FORMAT_VERSION);
        bytes.push(self.meta);
        bytes.extend_from_slice(&self.created_at_ms.to_le_bytes());
        bytes.extend_from_slice(&self.expires_at_ms.to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.len() < HEADER_LEN {
            return Err(EngineError::Corrupt(format!(
                "value of {} bytes is shorter than the header",
                bytes.len()
            )));
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(EngineError::Corrupt(format!(
                "unsupported value format version {}",
                bytes[0]
            )));
        }

        let created: [u8; 8] = bytes[2..10]
            .try_into()
            .map_err(|_| EngineError::Corrupt("invalid created timestamp".into()))?;
        let expires: [u8; 8] = bytes[10..18]
            .try_into()
            .map_err(|_| EngineError::Corrupt("invalid expiry timestamp".into()))?;

        Ok(Self {
            meta: bytes[1],
            created_at_ms: i64::from_le_bytes(created),
            expires_at_ms: i64::from_le_bytes(expires),
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Liveness check straight from encoded bytes. Undecodable values count
    /// as stale.
    pub fn is_stale(bytes: &[u8], now_ms: i64) -> bool {
        match Self::decode(bytes) {
            Ok(value) => value.is_expired_at(now_ms),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let value = StoredValue::new(b"abc".to_vec(), Some(Duration::from_secs(1)), 1, 1_000);
        let bytes = value.encode();
        assert_eq!(bytes.len(), HEADER_LEN + 3);
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(bytes[1], 1);
        assert_eq!(&bytes[2..10], &1_000i64.to_le_bytes());
        assert_eq!(&bytes[10..18], &2_000i64.to_le_bytes());
        assert_eq!(&bytes[18..], b"abc");
        assert_eq!(StoredValue::decode(&bytes).expect("decode"), value);
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let value = StoredValue::new(Vec::new(), None, 0, 5);
        assert_eq!(value.expires_at_ms, 0);
        assert!(!value.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_expiry_boundary() {
        let value = StoredValue::new(Vec::new(), Some(Duration::from_millis(10)), 1, 100);
        assert!(!value.is_expired_at(109));
        assert!(value.is_expired_at(110));
    }

    #[test]
    fn test_decode_rejects_short_and_unknown_version() {
        assert!(matches!(
            StoredValue::decode(&[1, 0, 0]),
            Err(EngineError::Corrupt(_))
        ));
        let mut bytes = StoredValue::new(Vec::new(), None, 0, 0).encode();
        bytes[0] = 9;
        assert!(matches!(
            StoredValue::decode(&bytes),
            Err(EngineError::Corrupt(_))
        ));
        assert!(StoredValue::is_stale(&bytes, 0));
    }
}
