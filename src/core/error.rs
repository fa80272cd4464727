//! Typed error handling for the controller
//!
//! Every failure a verb handler can hit, whether it happens while decoding
//! the query string or inside the document store, ends up as a
//! [`ControllerError`]. The HTTP layer then renders it according to the
//! configured [`ErrorMode`].
//!
//! # Example
//!
//! ```rust,ignore
//! use common_route::core::error::{ControllerError, ErrorMode};
//!
//! let err = ControllerError::InvalidId { id: "not-an-id".to_string() };
//! assert_eq!(err.error_code(), "INVALID_ID");
//!
//! // Legacy mode answers 200 with `{"error": {...}}`
//! let response = ErrorMode::Legacy.render(err);
//! ```

use crate::core::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The error type returned by every controller operation
#[derive(Debug)]
pub enum ControllerError {
    /// A query-string or body value could not be decoded
    Decode { key: String, message: String },

    /// The path identifier is not a valid document id
    InvalidId { id: String },

    /// The request body has the wrong shape
    InvalidBody { message: String },

    /// The document store rejected the operation
    Store(StoreError),

    /// A hook refused or failed to transform its input
    Hook { hook: String, message: String },

    /// The verb is routed but has no behavior
    NotImplemented { verb: String },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Decode { key, message } => {
                write!(f, "Failed to decode '{}': {}", key, message)
            }
            ControllerError::InvalidId { id } => {
                write!(f, "Invalid document id: '{}'", id)
            }
            ControllerError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
            ControllerError::Store(e) => write!(f, "{}", e),
            ControllerError::Hook { hook, message } => {
                write!(f, "Hook '{}' failed: {}", hook, message)
            }
            ControllerError::NotImplemented { verb } => {
                write!(f, "Verb {} is not implemented", verb)
            }
        }
    }
}

impl std::error::Error for ControllerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControllerError::Store(e) => Some(e),
            _ => None,
        }
    }
}

/// Error payload placed under the `error` key of a response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ControllerError {
    /// HTTP status used when the error mode is [`ErrorMode::Status`]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ControllerError::Decode { .. } => StatusCode::BAD_REQUEST,
            ControllerError::InvalidId { .. } => StatusCode::BAD_REQUEST,
            ControllerError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            ControllerError::Store(e) => e.status_code(),
            ControllerError::Hook { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ControllerError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ControllerError::Decode { .. } => "DECODE_ERROR",
            ControllerError::InvalidId { .. } => "INVALID_ID",
            ControllerError::InvalidBody { .. } => "INVALID_BODY",
            ControllerError::Store(e) => e.error_code(),
            ControllerError::Hook { .. } => "HOOK_ERROR",
            ControllerError::NotImplemented { .. } => "NOT_IMPLEMENTED",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ControllerError::Decode { key, .. } => Some(serde_json::json!({ "key": key })),
            ControllerError::InvalidId { id } => Some(serde_json::json!({ "id": id })),
            ControllerError::Hook { hook, .. } => Some(serde_json::json!({ "hook": hook })),
            ControllerError::NotImplemented { verb } => Some(serde_json::json!({ "verb": verb })),
            _ => None,
        }
    }

    /// Shorthand for a decode failure on `key`
    pub fn decode(key: impl Into<String>, err: impl fmt::Display) -> Self {
        ControllerError::Decode {
            key: key.into(),
            message: err.to_string(),
        }
    }
}

/// Renders with the status-mapped mode
impl IntoResponse for ControllerError {
    fn into_response(self) -> Response {
        ErrorMode::Status.render(self)
    }
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        ControllerError::Store(err)
    }
}

impl From<mongodb::bson::ser::Error> for ControllerError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        ControllerError::InvalidBody {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(err: serde_json::Error) -> Self {
        ControllerError::InvalidBody {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Error rendering
// =============================================================================

/// How an error is turned into an HTTP response
///
/// Both modes produce the same `{"error": {code, message, details}}` body.
/// They only differ in the status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Always answer `200 OK`, error carried in the body only
    #[default]
    Legacy,

    /// Answer with the status code of the error kind
    Status,
}

impl ErrorMode {
    /// The status line used for `err` under this mode
    pub fn status_for(&self, err: &ControllerError) -> StatusCode {
        match self {
            ErrorMode::Legacy => StatusCode::OK,
            ErrorMode::Status => err.status_code(),
        }
    }

    /// Build the HTTP response for `err`
    pub fn render(&self, err: ControllerError) -> Response {
        let status = self.status_for(&err);
        let body = Json(serde_json::json!({ "error": err.to_response() }));
        (status, body).into_response()
    }
}

/// A specialized Result type for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;
