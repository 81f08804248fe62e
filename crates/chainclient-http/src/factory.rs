//! Endpoint factory: hands out HTTP connections across configured endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::Rng;

use chainclient_core::error::TransportError;
use chainclient_core::transport::ConnectionFactory;

use crate::client::{HttpClientConfig, HttpRpcClient};

/// Produces [`HttpRpcClient`]s for a list of interchangeable endpoints.
///
/// The first endpoint is picked at random, later ones follow in round-robin
/// order, so several processes sharing one endpoint list spread their load
/// while a single pool still visits every endpoint when it rotates.
pub struct EndpointFactory {
    endpoints: Vec<String>,
    cursor: AtomicUsize,
    config: HttpClientConfig,
}

impl EndpointFactory {
    pub fn new(endpoints: Vec<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        if endpoints.is_empty() {
            return Err(TransportError::Other("no endpoints configured".into()));
        }
        let start = rand::thread_rng().gen_range(0..endpoints.len());
        Ok(Self {
            endpoints,
            cursor: AtomicUsize::new(start),
            config,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Endpoint the next `connect` will use, advancing the cursor.
    fn next_endpoint(&self) -> &str {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[idx]
    }
}

#[async_trait]
impl ConnectionFactory<HttpRpcClient> for EndpointFactory {
    async fn connect(&self) -> Result<HttpRpcClient, TransportError> {
        let endpoint = self.next_endpoint();
        tracing::debug!(endpoint, "opening connection");
        HttpRpcClient::new(endpoint, self.config.clone())
    }

    fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}
