//! Resilience
//!
//! Backoff policy for renewals that fail transiently.

pub mod retry;

pub use retry::{RetryPolicy, DEFAULT_RETRY_POLICY};
