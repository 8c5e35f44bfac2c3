//! Manager Builder
//!
//! Assembles a [`SessionLifecycleManager`] from its collaborators.

use std::sync::Arc;

use crate::core::{Clock, SystemClock};
use crate::error::{ConfigurationError, SessionError, SessionResult};
use crate::session::{SessionLifecycleManager, SessionTeardown};
use crate::telemetry::{NoOpSessionMetrics, SessionMetrics};
use crate::token::{InMemoryBackend, PersistenceBackend, TokenStore};
use crate::transport::RenewalTransport;
use crate::types::SessionConfig;

/// Session manager builder.
///
/// Only the renewal transport is required. Defaults: [`SessionConfig::default`],
/// an in-memory backend, the system clock, no-op metrics and a teardown
/// callback that does nothing.
#[derive(Default)]
pub struct SessionManagerBuilder {
    config: Option<SessionConfig>,
    backend: Option<Arc<dyn PersistenceBackend>>,
    transport: Option<Arc<dyn RenewalTransport>>,
    teardown: Option<Arc<dyn SessionTeardown>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Arc<dyn SessionMetrics>>,
}

impl SessionManagerBuilder {
    /// Create new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set persistence backend.
    pub fn backend(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set renewal transport.
    pub fn transport(mut self, transport: Arc<dyn RenewalTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the callback run when the session cannot be kept alive.
    pub fn on_teardown(mut self, teardown: impl SessionTeardown + 'static) -> Self {
        self.teardown = Some(Arc::new(teardown));
        self
    }

    /// Set clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn SessionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load stored tokens and build the manager.
    ///
    /// Background renewal does not begin until
    /// [`start`](SessionLifecycleManager::start) is called.
    pub async fn build(self) -> SessionResult<Arc<SessionLifecycleManager>> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport = self.transport.ok_or_else(|| {
            SessionError::Configuration(ConfigurationError::MissingRequired {
                field: "transport".to_string(),
            })
        })?;

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(InMemoryBackend::new()));
        let store = Arc::new(TokenStore::load(backend).await?);

        let teardown = self
            .teardown
            .unwrap_or_else(|| Arc::new(|_: &SessionError| {}));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(NoOpSessionMetrics));

        Ok(Arc::new(SessionLifecycleManager::from_parts(
            config, store, transport, teardown, clock, metrics,
        )))
    }
}
