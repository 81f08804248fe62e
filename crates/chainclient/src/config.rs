//! Client configuration, loadable from TOML.
//!
//! ```toml
//! endpoints = ["http://localhost:8881", "http://localhost:8882"]
//! pool_size = 4
//! pool_init = 1
//! call_timeout_ms = 10000
//!
//! [retry]
//! attempts_per_endpoint = 2
//! outer_backoff_ms = 200
//!
//! [account]
//! keystore = "config/account.key"
//! password_file = "config/password"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chainclient_core::{DispatchConfig, PoolConfig, RetryConfig};
use chainclient_http::HttpClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const DEFAULT_ENDPOINTS: [&str; 4] = [
    "http://localhost:8881",
    "http://localhost:8882",
    "http://localhost:8883",
    "http://localhost:8884",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoints: Vec<String>,
    /// Pool capacity.
    pub pool_size: usize,
    /// Connections opened when the client connects.
    pub pool_init: usize,
    pub idle_timeout_ms: u64,
    /// Budget for one acquire and for one attempt of a call.
    pub call_timeout_ms: u64,
    /// Per-HTTP-request timeout inside a connection.
    pub request_timeout_ms: u64,
    pub retry: RetrySettings,
    pub receipt: ReceiptPolling,
    /// Overrides `eth_chainId` when set.
    pub chain_id: Option<u64>,
    pub account: Option<AccountConfig>,
    /// Compiler used for local compilation.
    pub solc: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            pool_size: chainclient_core::pool::DEFAULT_CAPACITY,
            pool_init: chainclient_core::pool::DEFAULT_INIT,
            idle_timeout_ms: chainclient_core::pool::DEFAULT_IDLE_TIMEOUT.as_millis() as u64,
            call_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            retry: RetrySettings::default(),
            receipt: ReceiptPolling::default(),
            chain_id: None,
            account: None,
            solc: PathBuf::from("solc"),
        }
    }
}

/// Outer (across endpoints) and inner (same connection) retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts_per_endpoint: u32,
    pub outer_backoff_ms: u64,
    pub inner_attempts: u32,
    pub inner_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts_per_endpoint: 2,
            outer_backoff_ms: 200,
            inner_attempts: 3,
            inner_backoff_ms: 100,
        }
    }
}

/// Fibonacci backoff for `eth_getTransactionReceipt` polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptPolling {
    pub base_ms: u64,
    pub attempts: usize,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            base_ms: 500,
            attempts: 5,
        }
    }
}

/// Where the signing key comes from: a raw hex key, an encrypted keystore,
/// or a directory holding `account.key` and `password`.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub private_key: Option<String>,
    pub keystore: Option<PathBuf>,
    pub password_file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("keystore", &self.keystore)
            .field("password_file", &self.password_file)
            .field("dir", &self.dir)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse TOML. An empty endpoint list falls back to the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ClientError> {
        let mut config: Self =
            toml::from_str(raw).map_err(|e| ClientError::Config(e.to_string()))?;
        if config.endpoints.is_empty() {
            config.endpoints = Self::default().endpoints;
        }
        Ok(config)
    }

    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_pool_init(mut self, init: usize) -> Self {
        self.pool_init = init;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.account = Some(AccountConfig {
            private_key: Some(key.into()),
            ..Default::default()
        });
        self
    }

    pub fn with_keystore(mut self, keystore: impl Into<PathBuf>, password_file: impl Into<PathBuf>) -> Self {
        self.account = Some(AccountConfig {
            keystore: Some(keystore.into()),
            password_file: Some(password_file.into()),
            ..Default::default()
        });
        self
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            init: self.pool_init,
            capacity: self.pool_size,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
        }
        .normalized()
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            attempts_per_endpoint: self.retry.attempts_per_endpoint,
            outer_backoff: Duration::from_millis(self.retry.outer_backoff_ms),
            inner: RetryConfig::fixed(
                self.retry.inner_attempts,
                Duration::from_millis(self.retry.inner_backoff_ms),
            ),
        }
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoints.len(), 4);
        assert_eq!(config.endpoints[0], "http://localhost:8881");
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.pool_init, 1);
        assert_eq!(config.idle_timeout_ms, 6 * 60 * 1000);
        assert_eq!(config.receipt.attempts, 5);
    }

    #[test]
    fn parse_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
            endpoints = ["http://a:8545", "http://b:8545"]
            pool_size = 8
            pool_init = 2
            chain_id = 1356

            [retry]
            attempts_per_endpoint = 3

            [account]
            private_key = "0x01"
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoints, vec!["http://a:8545", "http://b:8545"]);
        assert_eq!(config.pool_config().capacity, 8);
        assert_eq!(config.pool_config().init, 2);
        assert_eq!(config.chain_id, Some(1356));
        assert_eq!(config.dispatch_config().attempts_per_endpoint, 3);
        assert_eq!(config.retry.outer_backoff_ms, 200);
    }

    #[test]
    fn empty_endpoints_fall_back_to_defaults() {
        let config = ClientConfig::from_toml_str("endpoints = []").unwrap();
        assert_eq!(config.endpoints.len(), 4);
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = ClientConfig::from_toml_str("pool_size = \"many\"").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn private_key_is_redacted() {
        let config = ClientConfig::default().with_private_key("deadbeefcafe");
        let shown = format!("{config:?}");
        assert!(!shown.contains("deadbeefcafe"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn pool_config_is_normalized() {
        let config = ClientConfig::default().with_pool_size(2).with_pool_init(5);
        let pool = config.pool_config();
        assert_eq!(pool.capacity, 2);
        assert_eq!(pool.init, 2);
    }
}
