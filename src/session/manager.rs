//! Session Lifecycle Manager
//!
//! Façade wiring the token store, single-flight renewal and the refresh
//! scheduler together.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::builders::SessionManagerBuilder;
use crate::core::{Clock, ExpiryPolicy};
use crate::error::{SessionError, SessionResult};
use crate::session::renewal::Renewer;
use crate::session::scheduler::{RefreshScheduler, SchedulerContext};
use crate::session::SessionTeardown;
use crate::telemetry::SessionMetrics;
use crate::token::TokenStore;
use crate::transport::RenewalTransport;
use crate::types::{SessionConfig, TokenTriple};

/// Keeps a session's access token fresh.
///
/// Construct one per session with [`SessionLifecycleManager::builder`] and
/// share it by `Arc`. Background renewal starts with [`start`](Self::start).
pub struct SessionLifecycleManager {
    config: SessionConfig,
    store: Arc<TokenStore>,
    renewer: Arc<Renewer>,
    scheduler: RefreshScheduler,
    expiry: ExpiryPolicy,
    clock: Arc<dyn Clock>,
}

impl SessionLifecycleManager {
    /// Create a builder.
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        config: SessionConfig,
        store: Arc<TokenStore>,
        transport: Arc<dyn RenewalTransport>,
        teardown: Arc<dyn SessionTeardown>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn SessionMetrics>,
    ) -> Self {
        let expiry = ExpiryPolicy::new(config.lead_time);
        let renewer = Arc::new(Renewer::new(
            Arc::clone(&store),
            transport,
            Arc::clone(&metrics),
            Arc::clone(&clock),
        ));
        let scheduler = RefreshScheduler::new(SchedulerContext {
            renewer: Arc::clone(&renewer),
            store: Arc::clone(&store),
            expiry,
            retry: config.retry,
            clock: Arc::clone(&clock),
            teardown,
            metrics,
        });

        Self {
            config,
            store,
            renewer,
            scheduler,
            expiry,
            clock,
        }
    }

    /// Arm background renewal from the stored expiry.
    ///
    /// A token that is expired or inside the lead time is renewed at once.
    /// Without stored tokens the manager stays idle; that is not an error.
    /// Returns whether the scheduler was armed.
    pub fn start(&self) -> bool {
        match self.store.read() {
            Some(tokens) => {
                info!(
                    token = %tokens.fingerprint(),
                    expires_at = %tokens.expires_at(),
                    "Starting session maintenance"
                );
                self.scheduler.arm(tokens.expires_at());
                true
            }
            None => {
                debug!("No stored session; staying idle");
                false
            }
        }
    }

    /// Adopt tokens from a fresh sign-in and start maintaining them.
    pub async fn begin_session(&self, tokens: TokenTriple) -> SessionResult<()> {
        self.scheduler.disarm();
        self.store.write(tokens).await?;
        self.start();
        Ok(())
    }

    /// Stop background renewal. Stored tokens are kept.
    pub fn stop(&self) {
        info!("Stopping session maintenance");
        self.scheduler.disarm();
    }

    /// Current access token, renewed first if it is expired or inside the
    /// lead time.
    ///
    /// Concurrent callers share a single renewal. A failed renewal is returned
    /// to every caller and is not retried here.
    pub async fn ensure_fresh(&self) -> SessionResult<String> {
        let current = self.store.read().ok_or(SessionError::NoSession)?;

        if !self.expiry.needs_renewal(current.expires_at(), self.clock.now()) {
            return Ok(current.access_token().to_string());
        }

        debug!(token = %current.fingerprint(), "Access token due; renewing on demand");
        let renewed = self.renewer.renew(1).await?;
        self.scheduler.rearm_if_active(renewed.expires_at());
        Ok(renewed.access_token().to_string())
    }

    /// The process resumed from suspension; renew now if the timer went stale.
    /// Returns whether a renewal was triggered.
    pub fn on_liveness_signal(&self) -> bool {
        self.scheduler.on_liveness_signal()
    }

    /// Forward every item of `signals` to [`on_liveness_signal`](Self::on_liveness_signal).
    ///
    /// The task ends when the stream ends or the manager is dropped.
    pub fn watch_liveness<S>(self: &Arc<Self>, signals: S) -> JoinHandle<()>
    where
        S: Stream<Item = ()> + Send + 'static,
    {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut signals = Box::pin(signals);
            while signals.next().await.is_some() {
                match manager.upgrade() {
                    Some(manager) => {
                        manager.on_liveness_signal();
                    }
                    None => break,
                }
            }
            debug!("Liveness watcher stopped");
        })
    }

    /// End the session deliberately: stop renewal and clear the tokens.
    /// The teardown callback is not invoked.
    pub async fn logout(&self) -> SessionResult<()> {
        info!("Logging out");
        self.scheduler.disarm();
        self.store.clear().await
    }

    /// Current token triple, if any.
    pub fn current_tokens(&self) -> Option<TokenTriple> {
        self.store.read()
    }

    /// Whether a renewal is running right now.
    pub fn is_renewing(&self) -> bool {
        self.renewer.is_in_flight()
    }

    /// Number of renewal operations actually started, excluding joins.
    pub fn renewals_started(&self) -> u64 {
        self.renewer.coordinator().started_count()
    }

    /// Token store.
    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Refresh scheduler.
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl std::fmt::Debug for SessionLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycleManager")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
