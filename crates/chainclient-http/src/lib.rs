//! chainclient-http: HTTP JSON-RPC connections for the ChainClient pool.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use chainclient_core::{ConnectionPool, DispatchConfig, Dispatcher, PoolConfig, RpcTransport};
//! use chainclient_http::{EndpointFactory, HttpClientConfig};
//!
//! # async fn run() -> Result<(), chainclient_core::TransportError> {
//! let factory = EndpointFactory::new(
//!     vec!["http://localhost:8881".into(), "http://localhost:8882".into()],
//!     HttpClientConfig::default(),
//! )?;
//! let pool = ConnectionPool::new(Arc::new(factory), PoolConfig::default()).await?;
//! let rpc = Dispatcher::new(Arc::new(pool), DispatchConfig::default());
//! let block: String = rpc.call(1, "eth_blockNumber", vec![]).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;

pub use client::{HttpClientConfig, HttpRpcClient};
pub use factory::EndpointFactory;
