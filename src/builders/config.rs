//! Configuration Builders
//!
//! Fluent builders for session and token endpoint configuration.

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::error::ConfigurationError;
use crate::resilience::RetryPolicy;
use crate::types::{
    ClientAuthMethod, ClientCredentials, HttpRenewalConfig, SessionConfig, DEFAULT_TIMEOUT,
};

/// Session configuration builder.
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create builder starting from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long before expiry renewal starts.
    pub fn lead_time(mut self, lead_time: Duration) -> Self {
        self.config.lead_time = lead_time;
        self
    }

    /// Set the retry backoff unit.
    pub fn retry_base_delay(mut self, base_delay: Duration) -> Self {
        self.config.retry.base_delay = base_delay;
        self
    }

    /// Set the number of retries after the first failed renewal.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Set the retry jitter factor (0.0-1.0).
    pub fn retry_jitter(mut self, jitter: f64) -> Self {
        self.config.retry.jitter = jitter;
        self
    }

    /// Replace the whole retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SessionConfig, ConfigurationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Create a new session configuration builder.
pub fn session_config() -> SessionConfigBuilder {
    SessionConfigBuilder::new()
}

/// Token endpoint configuration builder.
pub struct HttpRenewalConfigBuilder {
    token_endpoint: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_method: Option<ClientAuthMethod>,
    scopes: Vec<String>,
    timeout: Duration,
}

impl Default for HttpRenewalConfigBuilder {
    fn default() -> Self {
        Self {
            token_endpoint: None,
            client_id: None,
            client_secret: None,
            auth_method: None,
            scopes: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HttpRenewalConfigBuilder {
    /// Create new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = Some(method);
        self
    }

    /// Add a scope to request on renewal.
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the token endpoint configuration.
    ///
    /// Without an explicit method, a client with a secret authenticates with
    /// HTTP Basic and one without is treated as public.
    pub fn build(self) -> Result<HttpRenewalConfig, ConfigurationError> {
        let endpoint = self
            .token_endpoint
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "token_endpoint".to_string(),
            })?;

        let token_endpoint = Url::parse(&endpoint)
            .ok()
            .filter(|url| matches!(url.scheme(), "https" | "http"))
            .ok_or(ConfigurationError::InvalidEndpoint { url: endpoint })?;

        let client_id = self
            .client_id
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "client_id".to_string(),
            })?;

        let auth_method = self.auth_method.unwrap_or(if self.client_secret.is_some() {
            ClientAuthMethod::ClientSecretBasic
        } else {
            ClientAuthMethod::None
        });

        if auth_method != ClientAuthMethod::None && self.client_secret.is_none() {
            return Err(ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "timeout must be positive".to_string(),
            });
        }

        Ok(HttpRenewalConfig {
            token_endpoint,
            credentials: ClientCredentials {
                client_id,
                client_secret: self.client_secret,
                auth_method,
            },
            scopes: self.scopes,
            timeout: self.timeout,
        })
    }
}

/// Create a new token endpoint configuration builder.
pub fn http_renewal_config() -> HttpRenewalConfigBuilder {
    HttpRenewalConfigBuilder::new()
}
