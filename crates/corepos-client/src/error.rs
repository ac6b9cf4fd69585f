//! # API Error Type
//!
//! Every failure that leaves this crate has the same shape, which is also
//! what the front end receives:
//!
//! ```json
//! {
//!   "success": false,
//!   "message": "Hold invoice not found",
//!   "code": "NOT_FOUND",
//!   "details": { "status": 404 }
//! }
//! ```
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CoreError / ValidationError ─────────────► VALIDATION_ERROR            │
//! │                                             (before any network call)   │
//! │  reqwest::Error (connect, timeout) ───────► NETWORK_ERROR               │
//! │  HTTP 401 / 403 ──────────────────────────► AUTH_ERROR                  │
//! │  HTTP 404 ────────────────────────────────► NOT_FOUND                   │
//! │  other non-2xx, unreadable body ──────────► API_ERROR                   │
//! │  status change failed after retries ──────► STATUS_UPDATE_FAILED        │
//! │  DbError / SyncError ─────────────────────► STORAGE_ERROR               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use corepos_core::{CoreError, ValidationError};
use corepos_store::DbError;
use corepos_sync::SyncError;
use reqwest::StatusCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

/// Result type alias for client operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing or invalid input. Raised before any request is sent.
    ValidationError,

    /// 401 or 403.
    AuthError,

    /// 404.
    NotFound,

    /// Any other non-2xx response, or a body that could not be read.
    ApiError,

    /// Transport failure, or retries exhausted.
    NetworkError,

    /// A kitchen/bar status change that did not go through.
    StatusUpdateFailed,

    /// Local storage or window sync failed.
    StorageError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::AuthError => "AUTH_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::StatusUpdateFailed => "STATUS_UPDATE_FAILED",
            ErrorCode::StorageError => "STORAGE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized client error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
    /// HTTP status, when the error came from a response.
    pub status: Option<u16>,
}

impl Serialize for ApiError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ApiError", 4)?;
        s.serialize_field("success", &false)?;
        s.serialize_field("message", &self.message)?;
        s.serialize_field("code", &self.code)?;
        s.serialize_field("details", &self.details)?;
        s.end()
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            details: None,
            status: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{resource} not found: {id}"))
    }

    pub fn network(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::NetworkError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::StorageError, message)
    }

    /// Normalizes a non-2xx response.
    ///
    /// The message comes from the body's `message` or `error` field when
    /// there is one. A JSON body is kept as `details`.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let server_message = parsed.as_ref().and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let code = match status.as_u16() {
            401 | 403 => ErrorCode::AuthError,
            404 => ErrorCode::NotFound,
            _ => ErrorCode::ApiError,
        };
        let message = server_message.unwrap_or_else(|| match code {
            ErrorCode::AuthError => "Session expired or not authorized".to_string(),
            ErrorCode::NotFound => "Resource not found".to_string(),
            _ => format!("Request failed with HTTP {}", status.as_u16()),
        });

        let details = match parsed {
            Some(body) => json!({ "status": status.as_u16(), "body": body }),
            None if body.trim().is_empty() => json!({ "status": status.as_u16() }),
            None => json!({ "status": status.as_u16(), "body": body }),
        };

        ApiError {
            code,
            message,
            details: Some(details),
            status: Some(status.as_u16()),
        }
    }

    /// Returns true if sending the same request again might succeed.
    ///
    /// ## Retryable
    /// - `NETWORK_ERROR`
    /// - `API_ERROR` from a 5xx, 408 or 429
    pub fn is_retryable(&self) -> bool {
        match self.code {
            ErrorCode::NetworkError => true,
            ErrorCode::ApiError => match self.status {
                Some(s) => s >= 500 || s == 408 || s == 429,
                None => false,
            },
            _ => false,
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::new(ErrorCode::ApiError, format!("Unreadable response: {err}"));
        }
        if let Some(status) = err.status() {
            return ApiError::from_response(status, "");
        }
        let message = if err.is_timeout() {
            "Request timed out".to_string()
        } else if err.is_connect() {
            "Cannot reach the server".to_string()
        } else if err.is_builder() {
            format!("Invalid request: {err}")
        } else {
            format!("Network error: {err}")
        };
        ApiError::network(message)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ItemNotFound { item_id } => ApiError::not_found("Item", item_id),
            CoreError::LineNotFound(line) => ApiError::not_found("Cart line", line),
            other => ApiError::validation(other.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        tracing::error!(error = %err, "Local storage failure");
        ApiError::storage(err.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Storage(db) => db.into(),
            other => ApiError::storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::new(ErrorCode::ApiError, format!("Unexpected JSON shape: {err}"))
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::validation(format!("Invalid URL: {err}"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
