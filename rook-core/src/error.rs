//! Error types for rook operations

use thiserror::Error;

/// Cache store errors.
///
/// Every variant is recoverable from the caller's point of view: a failed
/// read degrades to a miss and a failed write is logged and dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache store connection failed: {reason}")]
    Connection { reason: String },

    #[error("Cache query failed: {reason}")]
    Query { reason: String },

    #[error("Cache payload serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Cache store lock poisoned")]
    LockPoisoned,
}

/// Errors raised by the upstream member API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream error: status={status} body={body}")]
    Status { status: u16, body: String },

    #[error("upstream transport failure: {reason}")]
    Transport { reason: String },

    #[error("upstream response could not be decoded: {reason}")]
    Decode { reason: String },

    #[error("invalid upstream url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl UpstreamError {
    /// HTTP status reported by the upstream, if the call got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the upstream answered 404 for the requested member.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Master error type for all rook errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RookError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Cancelled: {operation} did not finish before the request deadline")]
    Cancelled { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RookError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type alias for rook operations.
pub type RookResult<T> = Result<T, RookError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_display_matches_wire_format() {
        let err = UpstreamError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "upstream error: status=503 body=maintenance");
    }

    #[test]
    fn test_upstream_not_found_detection() {
        let not_found = UpstreamError::Status {
            status: 404,
            body: String::new(),
        };
        let transport = UpstreamError::Transport {
            reason: "connection reset".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!transport.is_not_found());
        assert_eq!(transport.status(), None);
    }

    #[test]
    fn test_store_error_converts_into_rook_error() {
        let err: RookError = StoreError::LockPoisoned.into();
        assert!(matches!(err, RookError::Store(StoreError::LockPoisoned)));
        assert!(err.to_string().contains("lock poisoned"));
    }

    #[test]
    fn test_cancelled_names_operation() {
        let err = RookError::cancelled("upstream fetch");
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("upstream fetch"));
    }
}
