//! Error Types for the rook API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rook_core::{RookError, StoreError, UpstreamError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required parameter is missing from request
    MissingField,

    /// Value is out of valid range
    InvalidRange,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Upstream has no such player
    PlayerNotFound,

    // ========================================================================
    // Upstream Errors (502, 504)
    // ========================================================================
    /// Upstream member API failed
    UpstreamError,

    /// Operation timed out
    Timeout,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField | ErrorCode::InvalidRange => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::PlayerNotFound => StatusCode::NOT_FOUND,

            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
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

/// Structured API error returned as the JSON body of failed requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required parameter '{}' is missing", field),
        )
    }

    pub fn invalid_range(field: &str, message: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Parameter '{}' is out of range: {}", field, message),
        )
    }

    pub fn player_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PlayerNotFound, message)
    }

    pub fn upstream_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamError, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<RookError> for ApiError {
    fn from(err: RookError) -> Self {
        match err {
            RookError::InvalidInput(message) => ApiError::invalid_input(message),
            RookError::Upstream(upstream) => {
                if upstream.is_not_found() {
                    return ApiError::player_not_found("Player not found upstream");
                }
                tracing::warn!(error = %upstream, "Upstream request failed");
                let details = upstream_details(&upstream);
                ApiError::upstream_error(upstream.to_string()).with_details(details)
            }
            RookError::Cancelled { operation } => ApiError::timeout(&operation),
            RookError::Store(store) => {
                // Store faults are normally absorbed by the service; reaching
                // here means a store-only endpoint failed.
                tracing::error!(error = %store, "Cache store error");
                ApiError::database_error("Cache store operation failed")
            }
            RookError::Internal(message) => {
                tracing::error!(%message, "Internal error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        RookError::Store(err).into()
    }
}

fn upstream_details(err: &UpstreamError) -> serde_json::Value {
    match err.status() {
        Some(status) => serde_json::json!({ "upstream_status": status }),
        None => serde_json::json!({ "upstream_status": null }),
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::PlayerNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::UpstreamError.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::PlayerNotFound).unwrap();
        assert_eq!(json, "\"PLAYER_NOT_FOUND\"");
    }

    #[test]
    fn test_invalid_range_names_the_field() {
        let err = ApiError::invalid_range("months", "must be at least 1");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Parameter 'months' is out of range: must be at least 1");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        let err: ApiError = RookError::invalid_input("batch is empty").into();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert_eq!(err.message, "batch is empty");
    }

    #[test]
    fn test_upstream_404_maps_to_not_found() {
        let err: ApiError = RookError::Upstream(UpstreamError::Status {
            status: 404,
            body: String::new(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upstream_failure_maps_to_bad_gateway_with_details() {
        let err: ApiError = RookError::Upstream(UpstreamError::Status {
            status: 503,
            body: "down".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.details.unwrap()["upstream_status"], 503);
    }

    #[test]
    fn test_cancelled_maps_to_gateway_timeout() {
        let err: ApiError = RookError::cancelled("upstream fetch").into();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(err.message.contains("upstream fetch"));
    }

    #[test]
    fn test_store_error_is_generic() {
        let err: ApiError = StoreError::Query {
            reason: "relation player_cache does not exist".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("player_cache"));
    }

    #[test]
    fn test_api_error_serialization_omits_empty_details() {
        let value = serde_json::to_value(ApiError::missing_field("ids")).unwrap();
        assert_eq!(value["code"], "MISSING_FIELD");
        assert!(value.get("details").is_none());
    }
}
