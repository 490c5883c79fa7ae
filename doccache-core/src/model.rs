//! Document model.
//!
//! JSON wire shapes for the records that travel through the cache. Field
//! names are camelCase on the wire and empty or zero-valued fields are
//! omitted when serializing, so documents produced here are byte-compatible
//! with the records already stored by existing producers.

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

// ============================================================================
// VERSION TAGS
// ============================================================================

/// Schema generation of a document section. Serialized as a bare integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SchemaVersion {
    #[default]
    Old,
    Current,
    Experimental,
}

impl SchemaVersion {
    pub fn is_old(&self) -> bool {
        matches!(self, SchemaVersion::Old)
    }
}

impl From<SchemaVersion> for u8 {
    fn from(version: SchemaVersion) -> Self {
        match version {
            SchemaVersion::Old => 0,
            SchemaVersion::Current => 1,
            SchemaVersion::Experimental => 2,
        }
    }
}

impl TryFrom<u8> for SchemaVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SchemaVersion::Old),
            1 => Ok(SchemaVersion::Current),
            2 => Ok(SchemaVersion::Experimental),
            other => Err(format!("unknown schema version {}", other)),
        }
    }
}

// ============================================================================
// OPERATION
// ============================================================================

/// Envelope status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Cleartext payload without a signature.
    Plain,
    /// Cleartext payload carrying a signature.
    Signed,
    /// Payload replaced by an encrypted blob.
    Sealed,
}

impl std::fmt::Display for EnvelopeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnvelopeState::Plain => "plain",
            EnvelopeState::Signed => "signed",
            EnvelopeState::Sealed => "sealed",
        };
        f.write_str(name)
    }
}

/// A versioned operation record subject to the envelope protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,
    #[serde(default, skip_serializing_if = "SchemaVersion::is_old")]
    pub data_version: SchemaVersion,
    #[serde(default, skip_serializing_if = "SchemaVersion::is_old")]
    pub metadata_version: SchemaVersion,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub encrypted: bool,
    /// base58 of `nonce || ciphertext` while sealed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_data: Option<PayloadData>,
}

impl Operation {
    pub fn new(operation_id: impl Into<String>, payload: PayloadData) -> Self {
        Self {
            operation_id: operation_id.into(),
            payload_data: Some(payload),
            ..Default::default()
        }
    }

    pub fn state(&self) -> EnvelopeState {
        if self.encrypted || self.encrypted_data.is_some() {
            return EnvelopeState::Sealed;
        }
        match &self.payload_data {
            Some(payload) if !payload.signature.is_empty() => EnvelopeState::Signed,
            _ => EnvelopeState::Plain,
        }
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Serialization {
            reason: e.to_string(),
        })
    }

    pub fn from_json(data: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(data).map_err(|e| EnvelopeError::Serialization {
            reason: e.to_string(),
        })
    }
}

/// Cleartext payload of an [`Operation`].
///
/// Field declaration order is load-bearing: the signing digest walks the
/// fields in exactly this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub dummy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub storage_data: Option<StorageData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub header_date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_header: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub header_layout: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub header_trancode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub header_trancode_compl: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub structure_valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub family_account: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDiagnostics {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub batch_id: String,
}

/// Storage event metadata as delivered by the blob store notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub e_tag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub content_length: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sequencer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_diagnostics: Option<StorageDiagnostics>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub size_bytes: u64,
}

/// Transfer channel a file arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginKind {
    Sftp,
    ConnectDirect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    #[serde(default, skip_serializing_if = "is_false")]
    pub sftp: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub connect_direct: bool,
}

impl Origin {
    /// SFTP wins when both flags are set; anything else is Connect:Direct.
    pub fn kind(&self) -> OriginKind {
        if self.sftp {
            OriginKind::Sftp
        } else {
            OriginKind::ConnectDirect
        }
    }
}

// ============================================================================
// OPERATION STATUS
// ============================================================================

/// Progress of a single pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Done,
    Failed,
    Started,
    Processing,
}

/// Processing status of an operation, as tracked by the ingestion pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Stages>,
}

impl OperationStatus {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Serialization {
            reason: e.to_string(),
        })
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(data).map_err(|e| EnvelopeError::Serialization {
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub e_tag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub content_length: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stages {
    // Existing producers emit the misspelled key.
    #[serde(
        rename = "solicitaionNumber",
        alias = "solicitationNumber",
        default,
        skip_serializing_if = "is_zero_u32"
    )]
    pub solicitation_number: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub completed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage1: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage2: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage3: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage4: Option<Stage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<ProcessStatus>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<InnerError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerError {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_operation_serializes_to_empty_object() {
        let op = Operation::default();
        assert_eq!(op.to_json().expect("serialize"), "{}");
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let op = Operation {
            runtime_version: "1.0.0".to_string(),
            data_version: SchemaVersion::Current,
            metadata_version: SchemaVersion::Experimental,
            operation_id: "op-1".to_string(),
            payload_data: Some(PayloadData {
                storage_data: Some(StorageData {
                    e_tag: "0x8D4BCC2E4835CD0".to_string(),
                    content_length: 524288,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let json = op.to_json().expect("serialize");
        assert!(json.contains(r#""runtimeVersion":"1.0.0""#));
        assert!(json.contains(r#""dataVersion":1"#));
        assert!(json.contains(r#""metadataVersion":2"#));
        assert!(json.contains(r#""operationId":"op-1""#));
        assert!(json.contains(r#""data":{"eTag":"0x8D4BCC2E4835CD0","contentLength":524288}"#));
        assert!(!json.contains("encrypted"));
    }

    #[test]
    fn test_credentials_family_account_always_serialized() {
        let json = serde_json::to_string(&Credentials::default()).expect("serialize");
        assert_eq!(json, r#"{"familyAccount":""}"#);
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let result = Operation::from_json(r#"{"dataVersion":7}"#);
        assert!(matches!(result, Err(EnvelopeError::Serialization { .. })));
    }

    #[test]
    fn test_origin_kind() {
        let sftp = Origin {
            sftp: true,
            connect_direct: true,
        };
        assert_eq!(sftp.kind(), OriginKind::Sftp);
        assert_eq!(Origin::default().kind(), OriginKind::ConnectDirect);
    }

    #[test]
    fn test_envelope_state() {
        let mut op = Operation::new("op-1", PayloadData::default());
        assert_eq!(op.state(), EnvelopeState::Plain);

        if let Some(payload) = op.payload_data.as_mut() {
            payload.signature = "3mJr7AoUXx2Wqd".to_string();
        }
        assert_eq!(op.state(), EnvelopeState::Signed);

        op.encrypted = true;
        op.encrypted_data = Some("abc".to_string());
        op.payload_data = None;
        assert_eq!(op.state(), EnvelopeState::Sealed);
    }

    #[test]
    fn test_operation_status_misspelled_key() {
        let status = OperationStatus {
            stages: Some(Stages {
                solicitation_number: 3,
                stage1: Some(Stage {
                    task: Some(ProcessStatus::Processing),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let bytes = status.to_json_bytes().expect("serialize");
        let json = String::from_utf8(bytes.clone()).expect("utf8");
        assert!(json.contains(r#""solicitaionNumber":3"#));
        assert!(json.contains(r#""task":"processing""#));

        let back = OperationStatus::from_json_bytes(&bytes).expect("deserialize");
        assert_eq!(back, status);

        let corrected =
            OperationStatus::from_json_bytes(br#"{"stages":{"solicitationNumber":5}}"#)
                .expect("deserialize alias");
        assert_eq!(corrected.stages.map(|s| s.solicitation_number), Some(5));
    }
}
