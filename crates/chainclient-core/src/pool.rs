//! Bounded connection pool with lazy slot filling and idle recycling.
//!
//! The pool owns exactly `capacity` slots. A slot is a borrow token that may
//! or may not carry a live connection: empty slots stand for unused capacity
//! and are filled through the [`ConnectionFactory`] the first time they are
//! borrowed. The number of live connections (borrowed + parked) therefore
//! never exceeds `capacity`.
//!
//! ```text
//! acquire ──► [ slot | slot | empty | empty ] ──► release
//!               ▲ semaphore permits == parked slots
//! ```

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::error::{PoolError, TransportError};
use crate::transport::{Connection, ConnectionFactory};

pub const DEFAULT_INIT: usize = 1;
pub const DEFAULT_CAPACITY: usize = 1;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(6 * 60);

/// Sizing of a [`ConnectionPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connections established eagerly by [`ConnectionPool::new`].
    pub init: usize,
    /// Maximum number of connections, live or not.
    pub capacity: usize,
    /// Parked connections older than this are re-established on borrow.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            init: DEFAULT_INIT,
            capacity: DEFAULT_CAPACITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Replace out-of-range values: zero capacity and zero idle timeout fall
    /// back to the defaults, `init` is clamped to `capacity`.
    pub fn normalized(mut self) -> Self {
        if self.capacity == 0 {
            self.capacity = DEFAULT_CAPACITY;
        }
        if self.init > self.capacity {
            self.init = self.capacity;
        }
        if self.idle_timeout.is_zero() {
            self.idle_timeout = DEFAULT_IDLE_TIMEOUT;
        }
        self
    }
}

struct Slot<C> {
    conn: Option<Arc<C>>,
    last_used: Instant,
}

impl<C> Slot<C> {
    fn empty() -> Self {
        Self {
            conn: None,
            last_used: Instant::now(),
        }
    }

    fn live(conn: Arc<C>) -> Self {
        Self {
            conn: Some(conn),
            last_used: Instant::now(),
        }
    }
}

/// A connection borrowed from the pool.
///
/// Hand it back with [`ConnectionPool::release`], or with
/// [`ConnectionPool::discard`] when the connection turned out to be broken.
pub struct PooledConnection<C> {
    conn: Arc<C>,
    last_used: Instant,
}

impl<C: Connection> PooledConnection<C> {
    /// Shared handle to the physical connection.
    pub fn handle(&self) -> Arc<C> {
        Arc::clone(&self.conn)
    }

    pub fn endpoint(&self) -> &str {
        self.conn.endpoint()
    }

    /// When the connection was last handed back to the pool.
    pub fn last_used(&self) -> Instant {
        self.last_used
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

/// Bounded pool of connections produced by a [`ConnectionFactory`].
pub struct ConnectionPool<C: Connection> {
    slots: Mutex<VecDeque<Slot<C>>>,
    available: Semaphore,
    factory: Arc<dyn ConnectionFactory<C>>,
    capacity: usize,
    idle_timeout: Duration,
    closed: RwLock<bool>,
}

impl<C: Connection> ConnectionPool<C> {
    /// Create a pool, eagerly opening `config.init` connections.
    ///
    /// If any eager connect fails, the connections opened so far are closed
    /// and the factory error is returned.
    pub async fn new(
        factory: Arc<dyn ConnectionFactory<C>>,
        config: PoolConfig,
    ) -> Result<Self, TransportError> {
        let config = config.normalized();
        let mut slots = VecDeque::with_capacity(config.capacity);

        for _ in 0..config.init {
            match factory.connect().await {
                Ok(conn) => slots.push_back(Slot::live(Arc::new(conn))),
                Err(e) => {
                    for conn in slots.iter().filter_map(|s: &Slot<C>| s.conn.as_ref()) {
                        conn.close();
                    }
                    tracing::warn!(error = %e, "pool warm-up failed");
                    return Err(e);
                }
            }
        }
        while slots.len() < config.capacity {
            slots.push_back(Slot::empty());
        }

        tracing::debug!(
            init = config.init,
            capacity = config.capacity,
            idle_timeout_ms = config.idle_timeout.as_millis() as u64,
            "connection pool created"
        );

        Ok(Self {
            slots: Mutex::new(slots),
            available: Semaphore::new(config.capacity),
            factory,
            capacity: config.capacity,
            idle_timeout: config.idle_timeout,
            closed: RwLock::new(false),
        })
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently parked in the pool (live or empty).
    pub fn idle_slots(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of distinct endpoints the factory rotates over.
    pub fn endpoint_count(&self) -> usize {
        self.factory.endpoint_count().max(1)
    }

    /// Borrow a connection, waiting up to `timeout` for a free slot.
    ///
    /// `None` or a zero duration waits indefinitely. A parked connection
    /// that sat idle longer than the idle timeout is closed and replaced.
    /// If establishing a connection fails, an empty slot goes back into the
    /// pool so no capacity is lost.
    pub async fn acquire(
        &self,
        timeout: Option<Duration>,
    ) -> Result<PooledConnection<C>, TransportError> {
        if self.is_closed() {
            return Err(PoolError::Closed.into());
        }

        let permit = match timeout.filter(|t| !t.is_zero()) {
            Some(limit) => tokio::time::timeout(limit, self.available.acquire())
                .await
                .map_err(|_| PoolError::Timeout {
                    ms: limit.as_millis() as u64,
                })?,
            None => self.available.acquire().await,
        }
        .map_err(|_| PoolError::Closed)?;
        permit.forget();

        let mut reservation = Reservation::new(self);
        let mut slot = self.pop_slot();

        if self.is_closed() {
            // close() is draining; hand the slot over untouched.
            reservation.disarm();
            self.push_slot(slot);
            return Err(PoolError::Closed.into());
        }

        if let Some(conn) = &slot.conn {
            if slot.last_used.elapsed() > self.idle_timeout {
                tracing::debug!(endpoint = conn.endpoint(), "recycling idle connection");
                conn.close();
                slot.conn = None;
            }
        }

        let conn = match slot.conn.take() {
            Some(conn) => conn,
            None => Arc::new(self.factory.connect().await?),
        };
        reservation.disarm();

        Ok(PooledConnection {
            conn,
            last_used: slot.last_used,
        })
    }

    /// Return a borrowed connection to the pool.
    ///
    /// Fails with [`PoolError::Closed`] once the pool is closed (the
    /// connection is closed and its slot still counts toward the drain) and
    /// with [`PoolError::Full`] if every slot is already parked.
    pub fn release(&self, conn: PooledConnection<C>) -> Result<(), PoolError> {
        if self.is_closed() {
            conn.close();
            if !self.available.is_closed() {
                self.push_slot(Slot::empty());
            }
            return Err(PoolError::Closed);
        }

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.len() >= self.capacity {
            tracing::error!(endpoint = conn.endpoint(), "released a connection into a full pool");
            return Err(PoolError::Full);
        }
        slots.push_back(Slot::live(conn.conn));
        drop(slots);
        self.available.add_permits(1);
        Ok(())
    }

    /// Close a broken connection and put an empty slot in its place.
    pub fn discard(&self, conn: PooledConnection<C>) {
        tracing::debug!(endpoint = conn.endpoint(), "discarding connection");
        conn.close();
        if !self.available.is_closed() {
            self.push_slot(Slot::empty());
        }
    }

    /// Close the pool.
    ///
    /// Waits until every slot is back, closes every live connection and
    /// rejects all later `acquire`/`release` calls. Calling it again is a
    /// no-op.
    pub async fn close(&self) {
        {
            let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return;
            }
            *closed = true;
        }

        match self.available.acquire_many(self.capacity as u32).await {
            Ok(permits) => permits.forget(),
            Err(_) => return,
        }

        let drained: Vec<Slot<C>> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let mut live = 0usize;
        for conn in drained.into_iter().filter_map(|s| s.conn) {
            conn.close();
            live += 1;
        }
        self.available.close();
        tracing::debug!(closed_connections = live, "connection pool closed");
    }

    fn pop_slot(&self) -> Slot<C> {
        // A permit was consumed, so a slot is guaranteed to be parked.
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(Slot::empty)
    }

    fn push_slot(&self, slot: Slot<C>) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(slot);
        self.available.add_permits(1);
    }
}

/// Puts an empty slot back if an `acquire` is cancelled or fails after it
/// consumed a permit.
struct Reservation<'a, C: Connection> {
    pool: &'a ConnectionPool<C>,
    armed: bool,
}

impl<'a, C: Connection> Reservation<'a, C> {
    fn new(pool: &'a ConnectionPool<C>) -> Self {
        Self { pool, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C: Connection> Drop for Reservation<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.push_slot(Slot::empty());
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub(crate) struct MockConn {
        pub id: usize,
        pub endpoint: String,
        pub closed: AtomicBool,
    }

    impl Connection for MockConn {
        fn endpoint(&self) -> &str {
            &self.endpoint
        }
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Round-robins over `endpoints`; connect number `fail_at` (1-based) fails.
    pub(crate) struct MockFactory {
        pub endpoints: Vec<String>,
        pub created: AtomicUsize,
        pub fail_at: Option<usize>,
        pub fail_all: AtomicBool,
    }

    impl MockFactory {
        pub fn new(endpoints: &[&str]) -> Self {
            Self {
                endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
                created: AtomicUsize::new(0),
                fail_at: None,
                fail_all: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ConnectionFactory<MockConn> for MockFactory {
        async fn connect(&self) -> Result<MockConn, TransportError> {
            if self.fail_all.load(Ordering::SeqCst) {
                return Err(TransportError::Connect {
                    endpoint: "mock".into(),
                    reason: "factory disabled".into(),
                });
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(n) == self.fail_at {
                return Err(TransportError::Other(format!("connect #{n} failed")));
            }
            Ok(MockConn {
                id: n,
                endpoint: self.endpoints[(n - 1) % self.endpoints.len()].clone(),
                closed: AtomicBool::new(false),
            })
        }

        fn endpoint_count(&self) -> usize {
            self.endpoints.len()
        }
    }

    fn config(init: usize, capacity: usize, idle: Duration) -> PoolConfig {
        PoolConfig {
            init,
            capacity,
            idle_timeout: idle,
        }
    }

    async fn make_pool(init: usize, capacity: usize, idle: Duration) -> (Arc<MockFactory>, ConnectionPool<MockConn>) {
        let factory = Arc::new(MockFactory::new(&["http://a"]));
        let pool = ConnectionPool::new(factory.clone(), config(init, capacity, idle))
            .await
            .unwrap();
        (factory, pool)
    }

    #[test]
    fn config_normalization() {
        let c = config(0, 0, Duration::ZERO).normalized();
        assert_eq!(c.capacity, DEFAULT_CAPACITY);
        assert_eq!(c.init, 0);
        assert_eq!(c.idle_timeout, DEFAULT_IDLE_TIMEOUT);

        let c = config(20, 0, Duration::ZERO).normalized();
        assert_eq!(c.capacity, 1);
        assert_eq!(c.init, 1);

        let c = config(4, 8, Duration::from_secs(3600)).normalized();
        assert_eq!((c.init, c.capacity), (4, 8));
    }

    #[tokio::test]
    async fn new_prewarms_and_fills_placeholders() {
        let (factory, pool) = make_pool(4, 8, Duration::from_secs(3600)).await;
        assert_eq!(factory.created.load(Ordering::SeqCst), 4);
        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.idle_slots(), 8);
    }

    #[tokio::test]
    async fn new_closes_opened_connections_on_failure() {
        let mut factory = MockFactory::new(&["http://a"]);
        factory.fail_at = Some(3);
        let factory = Arc::new(factory);
        let result = ConnectionPool::new(factory.clone(), config(3, 3, Duration::from_secs(1))).await;
        assert!(result.is_err());
        assert_eq!(factory.created.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn capacity_bounds_concurrent_borrows() {
        let (_, pool) = make_pool(0, 2, Duration::from_secs(3600)).await;
        let a = pool.acquire(None).await.unwrap();
        let _b = pool.acquire(None).await.unwrap();

        let err = pool
            .acquire(Some(Duration::from_millis(20)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Pool(PoolError::Timeout { .. })));

        pool.release(a).unwrap();
        let c = pool.acquire(Some(Duration::from_millis(20))).await;
        assert!(c.is_ok());
    }

    #[tokio::test]
    async fn parked_connection_is_reused() {
        let (factory, pool) = make_pool(1, 1, Duration::from_secs(3600)).await;
        let conn = pool.acquire(None).await.unwrap();
        let first = conn.id;
        pool.release(conn).unwrap();
        let conn = pool.acquire(None).await.unwrap();
        assert_eq!(conn.id, first);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_connection_is_recycled() {
        let (factory, pool) = make_pool(1, 1, Duration::from_millis(50)).await;
        let conn = pool.acquire(None).await.unwrap();
        let old = conn.handle();
        pool.release(conn).unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        let conn = pool.acquire(None).await.unwrap();
        assert_ne!(conn.id, old.id);
        assert!(old.closed.load(Ordering::SeqCst));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn factory_failure_keeps_slot() {
        let (factory, pool) = make_pool(0, 1, Duration::from_secs(3600)).await;
        factory.fail_all.store(true, Ordering::SeqCst);
        assert!(pool.acquire(None).await.is_err());
        assert_eq!(pool.idle_slots(), 1);

        factory.fail_all.store(false, Ordering::SeqCst);
        assert!(pool.acquire(Some(Duration::from_millis(20))).await.is_ok());
    }

    #[tokio::test]
    async fn release_into_full_pool_fails() {
        let (_, donor) = make_pool(1, 1, Duration::from_secs(3600)).await;
        let (_, full) = make_pool(1, 1, Duration::from_secs(3600)).await;
        let stray = donor.acquire(None).await.unwrap();
        assert_eq!(full.release(stray), Err(PoolError::Full));
    }

    #[tokio::test]
    async fn discard_replaces_with_placeholder() {
        let (factory, pool) = make_pool(1, 1, Duration::from_secs(3600)).await;
        let conn = pool.acquire(None).await.unwrap();
        let handle = conn.handle();
        pool.discard(conn);
        assert!(handle.closed.load(Ordering::SeqCst));
        assert_eq!(pool.idle_slots(), 1);

        let conn = pool.acquire(None).await.unwrap();
        assert_ne!(conn.id, handle.id);
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_waits_for_outstanding_connections() {
        let (_, pool) = make_pool(2, 2, Duration::from_secs(3600)).await;
        let pool = Arc::new(pool);
        let borrowed = pool.acquire(None).await.unwrap();
        let handle = borrowed.handle();

        let closer = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.close().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!closer.is_finished());
        assert!(pool.is_closed());

        assert_eq!(pool.release(borrowed), Err(PoolError::Closed));
        tokio::time::timeout(Duration::from_secs(1), closer)
            .await
            .expect("close should finish once every slot is back")
            .unwrap();
        assert!(handle.closed.load(Ordering::SeqCst));
        assert_eq!(pool.idle_slots(), 0);

        // Second close is a no-op.
        pool.close().await;
    }

    #[tokio::test]
    async fn closed_pool_rejects_acquire_and_release() {
        let (_, pool) = make_pool(1, 2, Duration::from_secs(3600)).await;
        let (_, other) = make_pool(1, 1, Duration::from_secs(3600)).await;
        pool.close().await;

        let err = pool.acquire(None).await.err().unwrap();
        assert_eq!(err.to_string(), "pool is closed");

        let stray = other.acquire(None).await.unwrap();
        assert_eq!(pool.release(stray), Err(PoolError::Closed));
    }

    #[tokio::test]
    async fn close_closes_live_connections() {
        let (_, pool) = make_pool(2, 3, Duration::from_secs(3600)).await;
        let a = pool.acquire(None).await.unwrap();
        let b = pool.acquire(None).await.unwrap();
        let (ha, hb) = (a.handle(), b.handle());
        pool.release(a).unwrap();
        pool.release(b).unwrap();

        pool.close().await;
        assert!(ha.closed.load(Ordering::SeqCst));
        assert!(hb.closed.load(Ordering::SeqCst));
    }
}
