//! Fixed or exponential backoff retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one retry loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, the first try included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    /// Multiplier applied on each retry. `1.0` gives a fixed delay.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(100))
    }
}

impl RetryConfig {
    /// `max_attempts` tries separated by a constant `delay`.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: delay,
            max_backoff: delay,
            multiplier: 1.0,
        }
    }
}

/// Stateless retry policy: computes the next delay given the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Attempt budget, never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Returns the delay to wait after the `attempt`-th failure (1-based),
    /// or `None` if that was the last permitted attempt.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts() {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.max(1.0).powi((attempt - 1) as i32);
        let cap_ms = self.config.max_backoff.max(self.config.initial_backoff).as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }

    /// Returns `true` if another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

/// Settings of the [`Dispatcher`](crate::dispatcher::Dispatcher).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Budget for one acquire and for one operation attempt. Zero waits
    /// without a deadline.
    #[serde(with = "millis")]
    pub call_timeout: Duration,
    /// Outer attempts granted per configured endpoint.
    pub attempts_per_endpoint: u32,
    /// Fixed delay between outer attempts.
    #[serde(with = "millis")]
    pub outer_backoff: Duration,
    /// Retry loop around the operation on a single connection.
    pub inner: RetryConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            attempts_per_endpoint: 2,
            outer_backoff: Duration::from_millis(200),
            inner: RetryConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Outer policy sized so that each of `endpoints` gets its share of tries.
    pub fn outer_policy(&self, endpoints: usize) -> RetryPolicy {
        let attempts = self.attempts_per_endpoint.max(1) * endpoints.max(1) as u32;
        RetryPolicy::new(RetryConfig::fixed(attempts, self.outer_backoff))
    }

    pub fn inner_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.inner.clone())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
