//! Coordinated Renewal
//!
//! The one renewal operation shared by the scheduler and `ensure_fresh`.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::core::{Clock, SharedRenewal, SingleFlightCoordinator};
use crate::error::SessionError;
use crate::telemetry::SessionMetrics;
use crate::token::TokenStore;
use crate::transport::RenewalTransport;
use crate::types::RenewalAttempt;

/// Reads the refresh token, calls the transport and stores the result, all
/// inside the single-flight coordinator.
pub(crate) struct Renewer {
    store: Arc<TokenStore>,
    transport: Arc<dyn RenewalTransport>,
    coordinator: SingleFlightCoordinator,
    metrics: Arc<dyn SessionMetrics>,
    clock: Arc<dyn Clock>,
}

impl Renewer {
    pub(crate) fn new(
        store: Arc<TokenStore>,
        transport: Arc<dyn RenewalTransport>,
        metrics: Arc<dyn SessionMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            transport,
            coordinator: SingleFlightCoordinator::new(),
            metrics,
            clock,
        }
    }

    /// Start a renewal, or join the one already running.
    ///
    /// `attempt_number` only labels a newly started renewal; a caller joining
    /// an in-flight renewal shares its attempt.
    pub(crate) fn renew(&self, attempt_number: u32) -> SharedRenewal {
        let mut started = false;

        let renewal = self.coordinator.run_exclusive(|| {
            started = true;

            let store = Arc::clone(&self.store);
            let transport = Arc::clone(&self.transport);
            let metrics = Arc::clone(&self.metrics);
            let attempt = RenewalAttempt {
                attempt_number,
                started_at: self.clock.now(),
            };
            let span = info_span!("session_renewal", attempt = attempt.attempt_number);

            async move {
                let current = store.read().ok_or(SessionError::NoSession)?;
                debug!(
                    token = %current.fingerprint(),
                    started_at = %attempt.started_at,
                    "Renewing session tokens"
                );

                metrics.record_renewal_attempt(attempt.attempt_number);
                let timer = Instant::now();
                let result = transport.renew(current.refresh_token()).await;
                let duration_ms = timer.elapsed().as_secs_f64() * 1000.0;
                metrics.record_renewal_result(result.is_ok(), duration_ms);

                let renewed = match result {
                    Ok(renewed) => renewed,
                    Err(e) => {
                        warn!(error = %e, retryable = e.is_retryable(), "Renewal failed");
                        return Err(e.into());
                    }
                };

                store.write(renewed.clone()).await?;
                info!(
                    token = %renewed.fingerprint(),
                    expires_at = %renewed.expires_at(),
                    "Session tokens renewed"
                );
                Ok(renewed)
            }
            .instrument(span)
        });

        if !started {
            self.metrics.record_single_flight_join();
        }

        renewal
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.coordinator.is_in_flight()
    }

    pub(crate) fn coordinator(&self) -> &SingleFlightCoordinator {
        &self.coordinator
    }
}
