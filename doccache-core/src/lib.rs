//! doccache core - document model and envelope protocol
//!
//! Pure data structures plus the signing and sealing routines that operate
//! on them. Storage lives in `doccache-storage`; this crate has no I/O.

pub mod envelope;
pub mod error;
pub mod model;

pub use envelope::{canonical_bytes, digest, NONCE_LEN};
pub use error::{ConfigError, DocCacheError, DocCacheResult, EnvelopeError, StorageError};
pub use model::{
    Credentials, EnvelopeState, FileInfo, Header, InnerError, Metadata, Operation,
    OperationStatus, Origin, OriginKind, PayloadData, ProcessStatus, SchemaVersion, Stage,
    Stages, StorageData, StorageDiagnostics,
};

/// Re-exported so callers can name key types without depending on `rsa`.
pub use rsa::{RsaPrivateKey, RsaPublicKey};
