//! Resilient dispatcher: pooled connections plus two-level retry.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{PoolError, TransportError};
use crate::policy::{DispatchConfig, RetryPolicy};
use crate::pool::{ConnectionPool, PooledConnection};
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::{Connection, RpcTransport};

/// Runs operations against pooled connections.
///
/// Every call goes through an outer loop that acquires a connection and an
/// inner loop that invokes the operation on it:
///
/// - a connectivity error discards the connection and moves to the next
///   outer attempt, which usually lands on another endpoint;
/// - a transient error (timeout, 5xx) is retried on the same connection
///   and escalates to the outer loop once the inner budget is spent;
/// - any other error is handed back unchanged after the connection has
///   been released, without further retries.
pub struct Dispatcher<C: Connection> {
    pool: Arc<ConnectionPool<C>>,
    config: DispatchConfig,
}

enum Attempt<T> {
    Finished(Result<T, TransportError>),
    Rotate(TransportError),
}

impl<C: Connection> Dispatcher<C> {
    pub fn new(pool: Arc<ConnectionPool<C>>, config: DispatchConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Execute `op` with a pooled connection under the retry policy.
    ///
    /// Returns the first success, the first non-connectivity error, or the
    /// last error seen once every outer attempt has been used.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, TransportError>
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, TransportError>> + Send,
        T: Send,
    {
        let outer = self.config.outer_policy(self.pool.endpoint_count());
        let inner = self.config.inner_policy();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let failure = match self.pool.acquire(Some(self.config.call_timeout)).await {
                Err(e @ TransportError::Pool(PoolError::Closed)) => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "failed to acquire connection");
                    e
                }
                Ok(conn) => match self.run_on(&conn, &inner, &op).await {
                    Attempt::Finished(result) => {
                        if let Err(e) = self.pool.release(conn) {
                            tracing::warn!(error = %e, "failed to release connection");
                        }
                        return result;
                    }
                    Attempt::Rotate(e) => {
                        tracing::warn!(
                            attempt,
                            endpoint = conn.endpoint(),
                            error = %e,
                            "connection unusable, rotating"
                        );
                        self.pool.discard(conn);
                        e
                    }
                },
            };

            match outer.next_delay(attempt) {
                Some(delay) => {
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying with a new connection");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(attempts = attempt, error = %failure, "all attempts failed");
                    return Err(failure);
                }
            }
        }
    }

    async fn run_on<T, F, Fut>(
        &self,
        conn: &PooledConnection<C>,
        policy: &RetryPolicy,
        op: &F,
    ) -> Attempt<T>
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, TransportError>> + Send,
        T: Send,
    {
        let limit = self.config.call_timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let call = op(conn.handle());
            let result = if limit.is_zero() {
                call.await
            } else {
                tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| {
                        Err(TransportError::Timeout {
                            ms: limit.as_millis() as u64,
                        })
                    })
            };

            match result {
                Ok(value) => return Attempt::Finished(Ok(value)),
                Err(e) if e.is_connectivity() => return Attempt::Rotate(e),
                Err(e) if e.is_transient() => match policy.next_delay(attempt) {
                    Some(delay) => {
                        tracing::debug!(
                            attempt,
                            endpoint = conn.endpoint(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "transient error, retrying on same connection"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Attempt::Rotate(e),
                },
                Err(e) => return Attempt::Finished(Err(e)),
            }
        }
    }

    /// Close the underlying pool, waiting for borrowed connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl<C> RpcTransport for Dispatcher<C>
where
    C: Connection + RpcTransport,
{
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let req = &req;
        self.execute(|conn| {
            let req = req.clone();
            async move { conn.send(req).await }
        })
        .await
    }

    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let reqs = &reqs;
        self.execute(|conn| {
            let reqs = reqs.clone();
            async move { conn.send_batch(reqs).await }
        })
        .await
    }

    fn url(&self) -> &str {
        "pool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::tests::{MockConn, MockFactory};
    use crate::pool::PoolConfig;
    use crate::policy::RetryConfig;
    use crate::request::JsonRpcError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn dispatch_config() -> DispatchConfig {
        DispatchConfig {
            call_timeout: Duration::from_millis(200),
            attempts_per_endpoint: 2,
            outer_backoff: Duration::from_millis(5),
            inner: RetryConfig::fixed(3, Duration::from_millis(5)),
        }
    }

    async fn dispatcher_with(
        endpoints: &[&str],
        capacity: usize,
        config: DispatchConfig,
    ) -> (Arc<MockFactory>, Dispatcher<MockConn>) {
        let factory = Arc::new(MockFactory::new(endpoints));
        let pool = ConnectionPool::new(
            factory.clone(),
            PoolConfig {
                init: 0,
                capacity,
                idle_timeout: Duration::from_secs(60),
            },
        )
        .await
        .unwrap();
        (factory, Dispatcher::new(Arc::new(pool), config))
    }

    async fn dispatcher(endpoints: &[&str], capacity: usize) -> (Arc<MockFactory>, Dispatcher<MockConn>) {
        dispatcher_with(endpoints, capacity, dispatch_config()).await
    }

    fn reverted() -> JsonRpcError {
        JsonRpcError {
            code: -32000,
            message: "execution reverted".into(),
            data: None,
        }
    }

    /// Endpoints containing "down" refuse; the others answer every request
    /// with a node error.
    #[async_trait]
    impl RpcTransport for MockConn {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            if self.endpoint.contains("down") {
                return Err(refused(&self.endpoint));
            }
            Ok(JsonRpcResponse::failure(req.id, reverted()))
        }

        fn url(&self) -> &str {
            &self.endpoint
        }
    }

    fn refused(endpoint: &str) -> TransportError {
        TransportError::Connect {
            endpoint: endpoint.into(),
            reason: "connection refused".into(),
        }
    }

    #[tokio::test]
    async fn rotates_to_healthy_endpoint() {
        let (factory, dispatcher) = dispatcher(&["http://down", "http://up"], 1).await;
        let calls = AtomicU32::new(0);

        let served_by = dispatcher
            .execute(|conn| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if conn.endpoint == "http://down" {
                        Err(refused(&conn.endpoint))
                    } else {
                        Ok(conn.endpoint.clone())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(served_by, "http://up");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        // The broken connection was discarded, the good one parked.
        assert_eq!(dispatcher.pool().idle_slots(), 1);
    }

    #[tokio::test]
    async fn application_error_returned_without_retry() {
        let (factory, dispatcher) = dispatcher(&["http://a", "http://b"], 1).await;
        let calls = AtomicU32::new(0);
        let rpc_err = reverted();

        let err = dispatcher
            .execute(|_conn| {
                calls.fetch_add(1, Ordering::SeqCst);
                let rpc_err = rpc_err.clone();
                async move { Err::<(), _>(TransportError::Rpc(rpc_err)) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Rpc(ref e) if *e == rpc_err));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.pool().idle_slots(), 1);
    }

    #[tokio::test]
    async fn transient_error_retried_on_same_connection() {
        let (factory, dispatcher) = dispatcher(&["http://a"], 1).await;
        let calls = AtomicU32::new(0);

        let id = dispatcher
            .execute(|conn| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(TransportError::Status {
                            endpoint: conn.endpoint.clone(),
                            status: 503,
                        })
                    } else {
                        Ok(conn.id)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_connectivity_error() {
        let (factory, dispatcher) = dispatcher(&["http://a", "http://b"], 1).await;
        let calls = AtomicU32::new(0);

        let err = dispatcher
            .execute(|conn| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(refused(&conn.endpoint)) }
            })
            .await
            .unwrap_err();

        assert!(err.is_connectivity());
        // Two endpoints, two outer attempts each, inner loop fails fast.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(factory.created.load(Ordering::SeqCst), 4);
        assert_eq!(dispatcher.pool().idle_slots(), 1);
    }

    #[tokio::test]
    async fn slow_operation_times_out() {
        let (_, dispatcher) = dispatcher(&["http://a"], 1).await;
        let err = dispatcher
            .execute(|_conn| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, TransportError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { ms: 200 }));
    }

    #[tokio::test]
    async fn closed_pool_surfaces_pool_error() {
        let (_, dispatcher) = dispatcher(&["http://a"], 1).await;
        dispatcher.close().await;
        let err = dispatcher
            .execute(|conn| async move { Ok::<_, TransportError>(conn.id) })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Pool(PoolError::Closed)));
    }

    #[tokio::test]
    async fn zero_call_timeout_means_no_deadline() {
        let config = DispatchConfig {
            call_timeout: Duration::ZERO,
            ..dispatch_config()
        };
        let (_, dispatcher) = dispatcher_with(&["http://a"], 1, config).await;
        let id = dispatcher
            .execute(|conn| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, TransportError>(conn.id)
            })
            .await
            .unwrap();
        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn closed_pool_is_not_retried() {
        let config = DispatchConfig {
            outer_backoff: Duration::from_secs(5),
            ..dispatch_config()
        };
        let (factory, dispatcher) = dispatcher_with(&["http://a", "http://b"], 1, config).await;
        dispatcher.close().await;

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.execute(|conn| async move { Ok::<_, TransportError>(conn.id) }),
        )
        .await
        .expect("closed pool should fail without backoff");
        assert!(matches!(result, Err(TransportError::Pool(PoolError::Closed))));
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn node_error_passes_through_send_without_rotation() {
        let (factory, dispatcher) = dispatcher(&["http://down", "http://up"], 1).await;

        let resp = dispatcher
            .send(JsonRpcRequest::new(1, "eth_call", vec![]))
            .await
            .unwrap();
        assert_eq!(resp.into_result().unwrap_err(), reverted());
        // The refusing endpoint cost one connection, the answering one is kept.
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);

        let typed: Result<String, _> = dispatcher.call(2, "eth_call", vec![]).await;
        let err = typed.unwrap_err();
        assert!(matches!(err, TransportError::Rpc(ref e) if *e == reverted()));
        assert!(!err.is_connectivity());
        assert!(!err.is_transient());
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.pool().idle_slots(), 1);

        let transport: &dyn RpcTransport = &dispatcher;
        assert_eq!(transport.url(), "pool");
    }
}
