//! Transport- and pool-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Substring that marks an error as a connectivity failure, whatever layer
/// produced it.
pub const CONNECTIVITY_MARKER: &str = "connection refused";

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be reached at all (refused, DNS, reset).
    #[error("connection refused by {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// HTTP request failed after the connection was established.
    #[error("HTTP error: {0}")]
    Http(String),

    /// HTTP status that signals an overloaded or failing node (429, 5xx).
    #[error("HTTP {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The connection was closed by the pool and must not be used again.
    #[error("connection to {endpoint} is closed")]
    Closed { endpoint: String },

    /// Borrowing a connection from the pool failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the endpoint itself is unusable and the caller
    /// should rotate to a different connection.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Closed { .. } => true,
            Self::Rpc(_) | Self::Pool(_) | Self::Deserialization(_) => false,
            other => other
                .to_string()
                .to_ascii_lowercase()
                .contains(CONNECTIVITY_MARKER),
        }
    }

    /// Returns `true` if the same request may succeed when repeated on the
    /// same connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Status { .. } | Self::Http(_))
            && !self.is_connectivity()
    }

    /// Returns `true` if this is a node-side execution error (not retryable).
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

/// Errors raised by the connection pool itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool is closed")]
    Closed,

    #[error("get client from pool timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// A connection was released into a pool that already holds every slot.
    #[error("put a client into a full pool")]
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_variant_is_connectivity() {
        let err = TransportError::Connect {
            endpoint: "http://localhost:8881".into(),
            reason: "tcp connect error".into(),
        };
        assert!(err.is_connectivity());
        assert!(!err.is_transient());
    }

    #[test]
    fn marker_in_message_is_connectivity() {
        let err = TransportError::Http("dial tcp 127.0.0.1:8881: Connection Refused".into());
        assert!(err.is_connectivity());
        assert!(!err.is_transient());
    }

    #[test]
    fn rpc_error_is_neither() {
        let err = TransportError::Rpc(JsonRpcError {
            code: -32000,
            message: "connection refused".into(),
            data: None,
        });
        assert!(!err.is_connectivity());
        assert!(!err.is_transient());
        assert!(err.is_execution_error());
    }

    #[test]
    fn timeout_is_transient() {
        let err = TransportError::Timeout { ms: 100 };
        assert!(err.is_transient());
        assert!(!err.is_connectivity());
    }

    #[test]
    fn pool_errors_display() {
        assert_eq!(PoolError::Closed.to_string(), "pool is closed");
        assert_eq!(PoolError::Full.to_string(), "put a client into a full pool");
    }
}
