//! chainclient: pooled, failover-aware Ethereum JSON-RPC client.
//!
//! # Overview
//!
//! - [`EthClient`]: compile, deploy, invoke, eth_* queries, signed
//!   transaction submission and receipt polling
//! - [`ClientConfig`]: endpoints, pool sizing, timeouts, retry settings and
//!   account, loadable from TOML
//! - [`NonceCounter`]: local nonce assignment for concurrent senders
//! - [`ClientError`] / [`ErrorKind`]: permanent, transient and rejected
//!   failures
//!
//! # Example
//! ```no_run
//! use chainclient::{BlockNumber, ClientConfig, EthClient};
//!
//! # async fn run() -> Result<(), chainclient::ClientError> {
//! let config = ClientConfig::default()
//!     .with_endpoints(["http://localhost:8545"])
//!     .with_pool_size(4);
//! let client = EthClient::connect(&config).await?;
//! let latest = client.block_by_number(BlockNumber::Latest, false).await?;
//! println!("{:?}", latest.and_then(|b| b.number));
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod client;
pub mod compile;
pub mod config;
pub mod error;
pub mod nonce;
pub mod tx;
pub mod types;

pub use account::{load_account, signer_from_hex, signer_from_keystore};
pub use client::EthClient;
pub use config::{AccountConfig, ClientConfig, ReceiptPolling, RetrySettings};
pub use error::{ClientError, ErrorKind};
pub use nonce::NonceCounter;
pub use tx::{SignedTx, UnsignedTx, DEPLOY_GAS_LIMIT, INVOKE_GAS_LIMIT, TRANSFER_GAS_LIMIT};
pub use types::{
    Block, BlockNumber, CallRequest, CompileResult, DeployedContract, Deployment, InvokeOutcome,
    Log, Receipt, Transaction, TransactionOptions,
};

pub use alloy_signer_local::PrivateKeySigner;
pub use chainclient_abi as abi;
pub use chainclient_core as rpc;
