//! Renewal Transport
//!
//! The operation that trades a refresh token for a new token triple.

pub mod http;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RenewalError;
use crate::types::TokenTriple;

pub use http::HttpRenewalTransport;

/// Renewal transport interface.
///
/// Implementations own their request timeout. Failures must say whether they
/// are worth retrying: see [`RenewalError`].
#[async_trait]
pub trait RenewalTransport: Send + Sync {
    /// Exchange `refresh_token` for a fresh token triple.
    async fn renew(&self, refresh_token: &str) -> Result<TokenTriple, RenewalError>;
}

/// A call observed by [`MockRenewalTransport`].
#[derive(Clone, Debug)]
pub struct RenewalCall {
    /// Refresh token presented.
    pub refresh_token: String,
    /// Runtime instant of the call (follows tokio's paused clock in tests).
    pub at: tokio::time::Instant,
}

type Responder = Arc<dyn Fn(&str) -> Result<TokenTriple, RenewalError> + Send + Sync>;

/// Mock renewal transport for testing.
///
/// Scripted responses are consumed first; afterwards the fallback responder
/// answers every call.
#[derive(Default)]
pub struct MockRenewalTransport {
    scripted: Mutex<VecDeque<Result<TokenTriple, RenewalError>>>,
    fallback: Mutex<Option<Responder>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<Vec<RenewalCall>>,
}

impl MockRenewalTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful renewal.
    pub fn queue_success(&self, tokens: TokenTriple) -> &Self {
        self.scripted.lock().push_back(Ok(tokens));
        self
    }

    /// Queue a failed renewal.
    pub fn queue_failure(&self, error: RenewalError) -> &Self {
        self.scripted.lock().push_back(Err(error));
        self
    }

    /// Answer every unscripted call with `responder`.
    pub fn respond_with<F>(&self, responder: F) -> &Self
    where
        F: Fn(&str) -> Result<TokenTriple, RenewalError> + Send + Sync + 'static,
    {
        *self.fallback.lock() = Some(Arc::new(responder));
        self
    }

    /// Fail every unscripted call with a clone of `error`.
    pub fn always_fail(&self, error: RenewalError) -> &Self {
        self.respond_with(move |_| Err(error.clone()))
    }

    /// Delay every response, keeping the renewal in flight for a while.
    pub fn set_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock() = Some(latency);
        self
    }

    /// Number of renewals requested.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Get call history.
    pub fn get_calls(&self) -> Vec<RenewalCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RenewalTransport for MockRenewalTransport {
    async fn renew(&self, refresh_token: &str) -> Result<TokenTriple, RenewalError> {
        self.calls.lock().push(RenewalCall {
            refresh_token: refresh_token.to_string(),
            at: tokio::time::Instant::now(),
        });

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(scripted) = self.scripted.lock().pop_front() {
            return scripted;
        }

        let fallback = self.fallback.lock().clone();
        match fallback {
            Some(responder) => responder(refresh_token),
            None => Err(RenewalError::transient("No mock renewal response available")),
        }
    }
}
