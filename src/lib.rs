//! Session Token Lifecycle Manager
//!
//! Keeps a client continuously authenticated by renewing a short-lived access
//! token with a longer-lived refresh token before it expires.
//!
//! # Features
//!
//! - Background renewal a configurable lead time before expiry
//! - Single-flight renewal: concurrent requests share one transport call
//! - Bounded linear backoff for transient failures
//! - Exactly-once teardown on unrecoverable failure
//! - Liveness check for processes resuming from suspension
//! - OAuth2 refresh grant transport (RFC 6749 Section 6)
//!
//! # Example
//!
//! ```rust,ignore
//! use session_lifecycle::{
//!     http_renewal_config, FileBackend, HttpRenewalTransport, SessionConfig,
//!     SessionLifecycleManager,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = http_renewal_config()
//!         .token_endpoint("https://provider.com/token")
//!         .client_id("my-client-id")
//!         .build()?;
//!
//!     let manager = SessionLifecycleManager::builder()
//!         .config(SessionConfig::from_env()?)
//!         .backend(Arc::new(FileBackend::new("session.json")))
//!         .transport(Arc::new(HttpRenewalTransport::new(endpoint)?))
//!         .on_teardown(|error: &session_lifecycle::SessionError| {
//!             eprintln!("Signed out: {}", error);
//!         })
//!         .build()
//!         .await?;
//!
//!     manager.start();
//!     let access_token = manager.ensure_fresh().await?;
//!     println!("Authorization: Bearer {}", access_token);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: token triple and configuration types
//! - `error`: error hierarchy and token endpoint error mapping
//! - `core`: clock, expiry arithmetic, single-flight coordinator, HTTP transport
//! - `resilience`: retry policy
//! - `token`: persistence backends and the token store
//! - `transport`: renewal transports
//! - `session`: refresh scheduler and the lifecycle manager
//! - `builders`: fluent builders for configuration and the manager
//! - `telemetry`: metrics and logging setup

pub mod builders;
pub mod core;
pub mod error;
pub mod resilience;
pub mod session;
pub mod telemetry;
pub mod token;
pub mod transport;
pub mod types;

// Re-export the manager
pub use session::{RefreshScheduler, SchedulerPhase, SessionLifecycleManager, SessionTeardown};

// Re-export builders
pub use builders::{
    http_renewal_config, session_config, HttpRenewalConfigBuilder, SessionConfigBuilder,
    SessionManagerBuilder,
};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, parse_error_response, ConfigurationError,
    RenewalError, SessionError, SessionResult, StorageError, TokenErrorResponse,
};

// Re-export types
pub use types::{
    // Config
    ClientAuthMethod, ClientCredentials, HttpRenewalConfig, SessionConfig,
    // Token
    RenewalAttempt, TokenResponse, TokenTriple,
};

// Re-export core components
pub use crate::core::{
    // Clock
    Clock, ManualClock, SystemClock,
    // Expiry
    is_expired, should_renew_soon, time_until_expiry, ExpiryPolicy, DEFAULT_LEAD_TIME,
    // Single flight
    SharedRenewal, SingleFlightCoordinator,
    // Transport
    HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
};

// Re-export resilience
pub use resilience::{RetryPolicy, DEFAULT_RETRY_POLICY};

// Re-export token storage
pub use token::{FileBackend, InMemoryBackend, MockBackend, PersistenceBackend, TokenStore};

#[cfg(feature = "jwt")]
pub use token::expiry_from_jwt;

// Re-export renewal transports
pub use transport::{HttpRenewalTransport, MockRenewalTransport, RenewalTransport};

// Re-export telemetry
pub use telemetry::{
    InMemorySessionMetrics, LogFormat, LogLevel, LoggingConfig, NoOpSessionMetrics,
    SessionMetrics,
};
