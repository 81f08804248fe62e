//! Retry policies for the resilient dispatcher.
//!
//! Two loops are stacked:
//! ```text
//! outer: acquire ─► inner: op(conn) ─► op(conn) ─► ... ─► release
//!   ▲                       │ connectivity error
//!   └── discard + backoff ◄─┘
//! ```
//! The outer loop rotates connections (and endpoints); the inner loop
//! repeats a flaky call against the same connection.

pub mod retry;

pub use retry::{DispatchConfig, RetryConfig, RetryPolicy};
