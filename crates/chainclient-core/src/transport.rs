//! The `RpcTransport` and `Connection` traits.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// The central async trait every RPC transport must implement.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`;
/// the typed [`call`](RpcTransport::call) helper is only available on sized
/// implementors.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send a batch of JSON-RPC requests.
    ///
    /// Default implementation sends them sequentially; override for true batching.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        Ok(responses)
    }

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;

    /// Convenience: call a method and deserialize the result.
    async fn call<T: DeserializeOwned>(
        &self,
        id: u64,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError>
    where
        Self: Sized,
    {
        let req = JsonRpcRequest::new(id, method, params);
        let resp = self.send(req).await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        serde_json::from_value(result).map_err(TransportError::Deserialization)
    }
}

/// One physical connection that can be parked in a
/// [`ConnectionPool`](crate::pool::ConnectionPool).
pub trait Connection: Send + Sync + 'static {
    /// Endpoint URL this connection talks to.
    fn endpoint(&self) -> &str;

    /// Release the underlying resources. Must be idempotent.
    fn close(&self) {}
}

/// Produces fresh connections for the pool.
#[async_trait]
pub trait ConnectionFactory<C: Connection>: Send + Sync + 'static {
    async fn connect(&self) -> Result<C, TransportError>;

    /// Number of distinct endpoints this factory rotates over.
    fn endpoint_count(&self) -> usize {
        1
    }
}
