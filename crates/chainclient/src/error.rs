//! Client-level error type.

use alloy_primitives::{Address, B256};
use chainclient_abi::AbiError;
use chainclient_core::{PoolError, TransportError};
use thiserror::Error;

/// What a caller can do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Will not succeed without a change on the caller's side (bad ABI,
    /// bad arguments, missing account, closed client).
    Permanent,
    /// May succeed when tried again (unreachable nodes, timeouts, a
    /// receipt that has not appeared yet).
    Transient,
    /// The node or the chain refused the request or the transaction.
    Rejected,
}

/// Errors returned by [`EthClient`](crate::EthClient).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error("no code at contract address {address}")]
    NoCode { address: Address },

    #[error("`{method}` on {address} returned no output")]
    EmptyOutput { address: Address, method: String },

    #[error("transaction {hash} failed on chain")]
    Reverted { hash: B256 },

    #[error("no receipt for transaction {hash} after {attempts} attempts")]
    ReceiptTimeout { hash: B256, attempts: usize },

    #[error("no account configured: sending transactions needs a signer")]
    NoSigner,

    #[error("signing failed: {0}")]
    Signer(String),

    #[error("compile failed: {0}")]
    Compile(String),

    #[error("empty contract: nothing to deploy")]
    EmptyContract,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(TransportError::Rpc(_)) => ErrorKind::Rejected,
            Self::Transport(TransportError::Pool(PoolError::Timeout { .. })) => ErrorKind::Transient,
            Self::Transport(e) if e.is_connectivity() || e.is_transient() => ErrorKind::Transient,
            Self::ReceiptTimeout { .. } => ErrorKind::Transient,
            Self::Reverted { .. } => ErrorKind::Rejected,
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Transport(TransportError::Deserialization(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainclient_core::JsonRpcError;

    #[test]
    fn error_kinds() {
        let refused = ClientError::Transport(TransportError::Connect {
            endpoint: "http://localhost:8881".into(),
            reason: "connection refused".into(),
        });
        assert_eq!(refused.kind(), ErrorKind::Transient);

        let rpc = ClientError::Transport(TransportError::Rpc(JsonRpcError {
            code: -32000,
            message: "nonce too low".into(),
            data: None,
        }));
        assert_eq!(rpc.kind(), ErrorKind::Rejected);

        assert_eq!(ClientError::Reverted { hash: B256::ZERO }.kind(), ErrorKind::Rejected);
        assert_eq!(
            ClientError::Abi(AbiError::MethodNotFound("foo".into())).kind(),
            ErrorKind::Permanent
        );
        assert_eq!(
            ClientError::Transport(TransportError::Pool(PoolError::Closed)).kind(),
            ErrorKind::Permanent
        );
        assert!(ClientError::ReceiptTimeout { hash: B256::ZERO, attempts: 5 }.is_transient());
    }
}
