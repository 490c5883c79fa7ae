//! doccache Test Utilities
//!
//! Shared test infrastructure for the doccache workspace:
//! - Shared RSA key pairs (generation is slow, so each is built once)
//! - Proptest generators for document types
//! - Fixtures for common scenarios
//! - Assertions for doccache error variants

pub use doccache_core::{
    Credentials, DocCacheError, DocCacheResult, EnvelopeError, EnvelopeState, FileInfo, Header,
    InnerError, Metadata, Operation, OperationStatus, Origin, PayloadData, ProcessStatus,
    RsaPrivateKey, RsaPublicKey, SchemaVersion, Stage, Stages, StorageData, StorageError,
};

// ============================================================================
// KEY MATERIAL
// ============================================================================

pub mod keys {
    //! Process-wide RSA key pairs.

    use super::*;
    use once_cell::sync::Lazy;
    use rand::rngs::OsRng;

    /// Modulus size for test keys.
    pub const TEST_KEY_BITS: usize = 2048;

    static SIGNING_KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
        RsaPrivateKey::new(&mut OsRng, TEST_KEY_BITS).expect("generate RSA signing key")
    });

    static UNRELATED_KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
        RsaPrivateKey::new(&mut OsRng, TEST_KEY_BITS).expect("generate RSA key")
    });

    /// Key used to sign fixtures.
    pub fn signing_key() -> &'static RsaPrivateKey {
        &SIGNING_KEY
    }

    pub fn verifying_key() -> RsaPublicKey {
        SIGNING_KEY.to_public_key()
    }

    /// A second key pair that never signed anything.
    pub fn unrelated_verifying_key() -> RsaPublicKey {
        UNRELATED_KEY.to_public_key()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating doccache values.

    use super::*;
    use proptest::prelude::*;

    // === Storage Generators ===

    /// Raw key bytes (never empty).
    pub fn arb_raw_key_bytes() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 1..64)
    }

    /// Value payloads, including the empty value.
    pub fn arb_value() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..4096)
    }

    fn arb_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ._/-]{0,24}"
    }

    // === Document Generators ===

    pub fn arb_schema_version() -> impl Strategy<Value = SchemaVersion> {
        prop_oneof![
            Just(SchemaVersion::Old),
            Just(SchemaVersion::Current),
            Just(SchemaVersion::Experimental),
        ]
    }

    pub fn arb_header() -> impl Strategy<Value = Header> {
        (arb_text(), arb_text(), arb_text(), any::<bool>()).prop_map(
            |(header_date, raw_header, header_layout, structure_valid)| Header {
                header_date,
                raw_header,
                header_layout,
                structure_valid,
                ..Default::default()
            },
        )
    }

    pub fn arb_metadata() -> impl Strategy<Value = Metadata> {
        (arb_text(), arb_text(), any::<u64>()).prop_map(|(hash, file_path, size_bytes)| {
            Metadata {
                hash,
                file_path,
                size_bytes,
                ..Default::default()
            }
        })
    }

    pub fn arb_origin() -> impl Strategy<Value = Origin> {
        (any::<bool>(), any::<bool>()).prop_map(|(sftp, connect_direct)| Origin {
            sftp,
            connect_direct,
        })
    }

    /// Unsigned payloads.
    pub fn arb_payload() -> impl Strategy<Value = PayloadData> {
        (
            any::<i64>(),
            any::<bool>(),
            arb_text(),
            proptest::option::of(arb_header()),
            proptest::option::of(arb_text()),
            proptest::option::of(arb_metadata()),
            proptest::option::of(arb_origin()),
        )
            .prop_map(
                |(timestamp, error, message, header, family_account, metadata, origin)| {
                    PayloadData {
                        timestamp,
                        error,
                        message,
                        header,
                        credentials: family_account.map(|family_account| Credentials {
                            family_account,
                        }),
                        metadata,
                        origin,
                        ..Default::default()
                    }
                },
            )
    }

    /// Plain (unsigned, unsealed) operations.
    pub fn arb_operation() -> impl Strategy<Value = Operation> {
        (
            "[a-z0-9-]{1,16}",
            arb_text(),
            arb_schema_version(),
            arb_payload(),
        )
            .prop_map(|(operation_id, runtime_version, data_version, payload)| {
                let mut op = Operation::new(operation_id, payload);
                op.runtime_version = runtime_version;
                op.data_version = data_version;
                op
            })
    }

    pub fn arb_process_status() -> impl Strategy<Value = ProcessStatus> {
        prop_oneof![
            Just(ProcessStatus::Done),
            Just(ProcessStatus::Failed),
            Just(ProcessStatus::Started),
            Just(ProcessStatus::Processing),
        ]
    }

    pub fn arb_stage() -> impl Strategy<Value = Stage> {
        (proptest::option::of(arb_process_status()), arb_text()).prop_map(|(task, message)| {
            Stage {
                task,
                message,
                ..Default::default()
            }
        })
    }

    pub fn arb_operation_status() -> impl Strategy<Value = OperationStatus> {
        (
            "[a-f0-9-]{8,36}",
            "[a-z0-9-]{1,16}",
            any::<u32>(),
            proptest::option::of(arb_stage()),
            proptest::option::of(arb_stage()),
        )
            .prop_map(|(id, operation_id, solicitation_number, stage1, stage2)| {
                OperationStatus {
                    id,
                    operation_id,
                    stages: Some(Stages {
                        solicitation_number,
                        stage1,
                        stage2,
                        ..Default::default()
                    }),
                    ..Default::default()
                }
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built documents for common testing scenarios.

    use super::*;
    use chrono::Utc;

    /// Fixed payload timestamp so canonical bytes are reproducible.
    pub const SAMPLE_TIMESTAMP: i64 = 1_700_000_000_000;

    /// A fully populated, unsigned payload.
    pub fn sample_payload() -> PayloadData {
        PayloadData {
            timestamp: SAMPLE_TIMESTAMP,
            message: "file received".to_string(),
            header: Some(Header {
                header_date: "20240101".to_string(),
                header_layout: "CNAB240".to_string(),
                structure_valid: true,
                ..Default::default()
            }),
            credentials: Some(Credentials {
                family_account: "acct-42".to_string(),
            }),
            storage_data: Some(StorageData {
                event_type: "BlobCreated".to_string(),
                content_type: "text/plain".to_string(),
                content_length: 2048,
                url: "https://blobs.example/inbound/file.txt".to_string(),
                ..Default::default()
            }),
            metadata: Some(Metadata {
                hash: "9f86d081884c7d65".to_string(),
                file_path: "inbound/file.txt".to_string(),
                mime_type: "text/plain".to_string(),
                size_bytes: 2048,
                ..Default::default()
            }),
            origin: Some(Origin {
                sftp: true,
                connect_direct: false,
            }),
            ..Default::default()
        }
    }

    /// Plain operation wrapping [`sample_payload`].
    pub fn sample_operation(operation_id: &str) -> Operation {
        let mut op = Operation::new(operation_id, sample_payload());
        op.runtime_version = "1.0.0".to_string();
        op.data_version = SchemaVersion::Current;
        op
    }

    /// [`sample_operation`] signed with [`keys::signing_key`](crate::keys::signing_key).
    pub fn signed_operation(operation_id: &str) -> Operation {
        let mut op = sample_operation(operation_id);
        op.sign(crate::keys::signing_key())
            .expect("sign sample operation");
        op
    }

    /// A status record midway through the pipeline.
    pub fn sample_operation_status(id: &str, operation_id: &str) -> OperationStatus {
        let now = Utc::now().to_rfc3339();
        OperationStatus {
            id: id.to_string(),
            operation_id: operation_id.to_string(),
            runtime_version: "1.0.0".to_string(),
            status: "processing".to_string(),
            correlation_id: format!("corr-{}", operation_id),
            file_info: Some(FileInfo {
                content_type: "text/plain".to_string(),
                content_length: 2048,
                ..Default::default()
            }),
            stages: Some(Stages {
                solicitation_number: 1,
                stage1: Some(Stage {
                    task: Some(ProcessStatus::Done),
                    start_time: now.clone(),
                    end_time: now.clone(),
                    ..Default::default()
                }),
                stage2: Some(Stage {
                    task: Some(ProcessStatus::Processing),
                    start_time: now,
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    /// Flip one character of a base58 signature, keeping it valid base58.
    pub fn flip_signature_char(signature: &str) -> String {
        let mut chars: Vec<char> = signature.chars().collect();
        if let Some(first) = chars.first_mut() {
            *first = if *first == '2' { '3' } else { '2' };
        }
        chars.into_iter().collect()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion functions for doccache error variants.

    use super::*;

    /// Assert that a DocCacheResult is a KeyNotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &DocCacheResult<T>) {
        match result {
            Err(DocCacheError::Storage(StorageError::KeyNotFound { .. })) => {}
            other => panic!("Expected KeyNotFound error, got: {:?}", other),
        }
    }

    /// Assert that an envelope result failed signature verification.
    #[track_caller]
    pub fn assert_signature_invalid<T: std::fmt::Debug>(result: &Result<T, EnvelopeError>) {
        match result {
            Err(EnvelopeError::SignatureInvalid) => {}
            other => panic!("Expected SignatureInvalid, got: {:?}", other),
        }
    }

    /// Assert that an envelope result failed authenticated decryption.
    #[track_caller]
    pub fn assert_authentication_failed<T: std::fmt::Debug>(result: &Result<T, EnvelopeError>) {
        match result {
            Err(EnvelopeError::AuthenticationFailed) => {}
            other => panic!("Expected AuthenticationFailed, got: {:?}", other),
        }
    }

    /// Assert that an operation is in the given envelope state.
    #[track_caller]
    pub fn assert_state(op: &Operation, expected: EnvelopeState) {
        assert_eq!(op.state(), expected, "Unexpected envelope state");
    }
}
