//! HTTP error mapping.
//!
//! Store and envelope failures become an [`ApiError`], rendered as a JSON
//! body whose status code comes from its [`ErrorCode`]. Engine details are
//! logged, not returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use doccache_core::{DocCacheError, EnvelopeError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Wire-visible error category; fixes the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Malformed request
    InvalidInput,

    /// A path or query value has the wrong shape
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No live document behind the requested key
    KeyNotFound,

    // ========================================================================
    // Envelope Errors (422)
    // ========================================================================
    /// Stored document failed signature or decryption checks
    EnvelopeRejected,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Unexpected failure in the server itself
    InternalError,

    /// Storage engine operation failed
    StorageError,

    /// Store is not ready to serve
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

            ErrorCode::KeyNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EnvelopeRejected => StatusCode::UNPROCESSABLE_ENTITY,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::StorageError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// JSON error body returned by every failing route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,

    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' must be {}", field, expected),
        )
    }

    pub fn key_not_found(key: impl fmt::Display) -> Self {
        Self::new(ErrorCode::KeyNotFound, format!("Key {} not found", key))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Lets handlers return `Result<_, ApiError>` directly:
/// ```ignore
/// async fn handler() -> Result<Json<Response>, ApiError> {
///     Err(ApiError::key_not_found("ABC"))
/// }
/// ```
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<DocCacheError> for ApiError {
    fn from(err: DocCacheError) -> Self {
        match err {
            DocCacheError::Storage(StorageError::KeyNotFound { key }) => {
                ApiError::key_not_found(key)
            }
            DocCacheError::Storage(StorageError::InvalidKey { reason }) => {
                ApiError::invalid_input(reason)
            }
            DocCacheError::Storage(StorageError::Closed) => {
                ApiError::service_unavailable("Cache store is closed")
            }
            DocCacheError::Storage(other) => {
                // Log the full error, return a generic one
                tracing::error!(error = %other, "Storage error");
                ApiError::storage_error("Storage operation failed")
            }
            DocCacheError::Envelope(e) => e.into(),
            DocCacheError::Config(e) => {
                tracing::error!(error = %e, "Configuration error");
                ApiError::internal_error(e.to_string())
            }
        }
    }
}

impl From<EnvelopeError> for ApiError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::SignatureInvalid | EnvelopeError::AuthenticationFailed => {
                ApiError::new(ErrorCode::EnvelopeRejected, err.to_string())
            }
            EnvelopeError::Decode { field, reason } => {
                ApiError::invalid_format(&field, &format!("valid base58 ({})", reason))
            }
            other => {
                tracing::error!(error = %other, "Envelope error");
                ApiError::internal_error(other.to_string())
            }
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
