//! Configuration Types
//!
//! Session maintenance and token endpoint configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::core::DEFAULT_LEAD_TIME;
use crate::error::ConfigurationError;
use crate::resilience::RetryPolicy;

/// Environment variable names read by [`SessionConfig::from_env`].
pub const ENV_LEAD_TIME_SECS: &str = "SESSION_LEAD_TIME_SECS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "SESSION_RETRY_BASE_DELAY_MS";
pub const ENV_MAX_RETRIES: &str = "SESSION_MAX_RETRIES";
pub const ENV_RETRY_JITTER: &str = "SESSION_RETRY_JITTER";

/// Session maintenance configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How long before expiry a renewal starts.
    pub lead_time: Duration,
    /// Backoff for transient renewal failures.
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lead_time: DEFAULT_LEAD_TIME,
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Creates a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let defaults = Self::default();

        let lead_time = env_parse::<u64>(ENV_LEAD_TIME_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.lead_time);

        let base_delay = env_parse::<u64>(ENV_RETRY_BASE_DELAY_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.base_delay);

        let max_retries =
            env_parse::<u32>(ENV_MAX_RETRIES)?.unwrap_or(defaults.retry.max_retries);

        let jitter = env_parse::<f64>(ENV_RETRY_JITTER)?.unwrap_or(defaults.retry.jitter);

        let config = Self {
            lead_time,
            retry: RetryPolicy::new(base_delay, max_retries).with_jitter(jitter),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scheduler cannot honor.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.retry.max_retries > 0 && self.retry.base_delay.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "retry base delay must be positive when retries are enabled"
                    .to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigurationError::InvalidConfig {
                message: format!("retry jitter {} is outside 0.0-1.0", self.retry.jitter),
            });
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigurationError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigurationError::InvalidConfig {
                message: format!("{} has invalid value {:?}", name, raw),
            }),
        Err(_) => Ok(None),
    }
}

/// Client credentials for the token endpoint.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret (for confidential clients).
    pub client_secret: Option<SecretString>,
    /// Client authentication method.
    pub auth_method: ClientAuthMethod,
}

impl Default for ClientCredentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            auth_method: ClientAuthMethod::None,
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client authentication method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// client_id and client_secret in request body.
    ClientSecretPost,
    /// HTTP Basic Authentication header.
    ClientSecretBasic,
    /// Public client: client_id in the body, no secret.
    #[default]
    None,
}

/// Refresh-grant endpoint configuration.
#[derive(Clone, Debug)]
pub struct HttpRenewalConfig {
    /// Token endpoint URL.
    pub token_endpoint: Url,
    /// Client credentials.
    pub credentials: ClientCredentials,
    /// Scopes to request on renewal; empty keeps the original grant.
    pub scopes: Vec<String>,
    /// HTTP timeout for one renewal request.
    pub timeout: Duration,
}

/// Default HTTP timeout for a renewal request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.lead_time, Duration::from_secs(300));
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_backoff() {
        let config = SessionConfig {
            lead_time: Duration::from_secs(60),
            retry: RetryPolicy::new(Duration::ZERO, 3),
        };
        assert!(config.validate().is_err());

        let no_retries = SessionConfig {
            lead_time: Duration::from_secs(60),
            retry: RetryPolicy::new(Duration::ZERO, 0),
        };
        assert!(no_retries.validate().is_ok());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(ENV_LEAD_TIME_SECS, "120");
        std::env::set_var(ENV_MAX_RETRIES, "5");
        let config = SessionConfig::from_env().unwrap();
        assert_eq!(config.lead_time, Duration::from_secs(120));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));

        std::env::set_var(ENV_MAX_RETRIES, "many");
        assert!(SessionConfig::from_env().is_err());

        std::env::remove_var(ENV_LEAD_TIME_SECS);
        std::env::remove_var(ENV_MAX_RETRIES);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = ClientCredentials {
            client_id: "client".to_string(),
            client_secret: Some(SecretString::new("hunter2".to_string())),
            auth_method: ClientAuthMethod::ClientSecretBasic,
        };
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
