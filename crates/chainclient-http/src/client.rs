//! HTTP JSON-RPC connection backed by `reqwest`.
//!
//! One [`HttpRpcClient`] is one pooled connection to one endpoint. Retries
//! and failover live in the dispatcher, so a single `send` makes exactly
//! one HTTP request.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chainclient_core::error::TransportError;
use chainclient_core::request::{JsonRpcRequest, JsonRpcResponse};
use chainclient_core::transport::{Connection, RpcTransport};

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP JSON-RPC connection to a single endpoint.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
    closed: AtomicBool,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let url = url.into();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Connect {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            url,
            http,
            request_timeout: config.request_timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed {
                endpoint: self.url.clone(),
            });
        }
        Ok(())
    }

    fn map_send_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_connect() {
            TransportError::Connect {
                endpoint: self.url.clone(),
                reason: e.to_string(),
            }
        } else if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    async fn post<B, R>(&self, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + ?Sized + Sync,
        R: serde::de::DeserializeOwned,
    {
        self.ensure_open()?;

        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(TransportError::Status {
                endpoint: self.url.clone(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Other(format!(
                "HTTP {} from {}: {body}",
                status.as_u16(),
                self.url
            )));
        }

        let bytes = resp.bytes().await.map_err(|e| self.map_send_error(e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(url = %self.url, method = %req.method, id = %req.id, "rpc request");
        let resp: JsonRpcResponse = self.post(&req).await?;
        tracing::trace!(url = %self.url, id = %resp.id, ok = resp.is_ok(), "rpc response");
        Ok(resp)
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        tracing::trace!(url = %self.url, size = reqs.len(), "rpc batch");
        self.post(&reqs).await
    }

    fn url(&self) -> &str {
        &self.url
    }
}

impl Connection for HttpRpcClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::trace!(url = %self.url, "connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_connection_rejects_requests() {
        let client = HttpRpcClient::default_for("http://localhost:8881").unwrap();
        client.close();
        client.close();
        assert!(client.is_closed());

        let err = client
            .send(JsonRpcRequest::new(1, "eth_blockNumber", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed { .. }));
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn refused_connection_is_connectivity_error() {
        let client = HttpRpcClient::new(
            "http://127.0.0.1:1",
            HttpClientConfig {
                request_timeout: Duration::from_secs(2),
            },
        )
        .unwrap();
        let err = client
            .send(JsonRpcRequest::new(1, "eth_blockNumber", vec![]))
            .await
            .unwrap_err();
        assert!(err.is_connectivity(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let client = HttpRpcClient::default_for("http://127.0.0.1:1").unwrap();
        assert!(client.send_batch(vec![]).await.unwrap().is_empty());
    }
}
