//! chainclient-core: connection pooling and resilient dispatch for ChainClient.
//!
//! # Overview
//!
//! - [`RpcTransport`]: the async trait every JSON-RPC transport implements
//! - [`Connection`] / [`ConnectionFactory`]: what the pool stores and how it
//!   creates new entries
//! - [`ConnectionPool`]: bounded, lazily filled pool with idle recycling
//! - [`Dispatcher`]: outer/inner retry around pooled connections, with
//!   endpoint rotation on connectivity failures
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`TransportError`] / [`PoolError`]: structured error types

pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod pool;
pub mod request;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use error::{PoolError, TransportError};
pub use policy::{DispatchConfig, RetryConfig, RetryPolicy};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestIds, RpcId};
pub use transport::{Connection, ConnectionFactory, RpcTransport};
