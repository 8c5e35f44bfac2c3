//! Session Error Types
//!
//! Error hierarchy for the session lifecycle manager.
//!
//! Every error type here is `Clone`: a single failed renewal is delivered to
//! every caller waiting on it.

use std::time::Duration;
use thiserror::Error;

/// Root error type for session lifecycle operations.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Renewal error: {0}")]
    Renewal(#[from] RenewalError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No session tokens are stored")]
    NoSession,

    #[error("Renewal task aborted: {message}")]
    RenewalAborted { message: String },
}

impl SessionError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "SESSION_CONFIG",
            Self::Renewal(RenewalError::Transient { .. }) => "SESSION_RENEWAL_TRANSIENT",
            Self::Renewal(RenewalError::Rejected { .. }) => "SESSION_RENEWAL_REJECTED",
            Self::Renewal(RenewalError::InvalidResponse { .. }) => "SESSION_RENEWAL_INVALID",
            Self::Storage(_) => "SESSION_STORAGE",
            Self::NoSession => "SESSION_NONE",
            Self::RenewalAborted { .. } => "SESSION_ABORTED",
        }
    }

    /// Check if a renewal that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Renewal(e) => e.is_retryable(),
            Self::RenewalAborted { .. } => true,
            _ => false,
        }
    }

    /// Get retry-after hint if the renewal endpoint supplied one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Renewal(RenewalError::Transient { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }

    /// Check if error requires the user to sign in again.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Renewal(RenewalError::Rejected { .. }) | Self::NoSession
        )
    }
}

/// Configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Failure reported by a renewal transport.
///
/// The distinction between `Transient` and the other variants decides whether
/// the scheduler backs off and retries or tears the session down at once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    /// Network blip, timeout, rate limit or server-side failure.
    #[error("Transient renewal failure: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The refresh token itself was rejected, revoked or has expired.
    #[error("Refresh token rejected: {message}")]
    Rejected { message: String },

    /// The renewal endpoint answered with something that is not a token set.
    #[error("Invalid renewal response: {message}")]
    InvalidResponse { message: String },
}

impl RenewalError {
    /// Shorthand for a transient failure without a retry-after hint.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Shorthand for a rejected refresh token.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Storage error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Clear failed: {message}")]
    ClearFailed { message: String },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// OAuth2 error response body from a token endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<TokenErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Classify a failed token endpoint response.
///
/// `invalid_grant` and friends mean the refresh token can never succeed again;
/// throttling and server-side errors are worth another attempt.
pub fn create_error_from_response(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> RenewalError {
    if let Some(response) = parse_error_response(body) {
        let message = response
            .error_description
            .clone()
            .unwrap_or_else(|| response.error.clone());

        return match response.error.as_str() {
            "temporarily_unavailable" | "server_error" | "slow_down" => RenewalError::Transient {
                message,
                retry_after,
            },
            _ => RenewalError::Rejected { message },
        };
    }

    match status {
        400 | 401 | 403 => RenewalError::Rejected {
            message: format!("HTTP {}", status),
        },
        408 | 429 | 500..=599 => RenewalError::Transient {
            message: format!("HTTP {}", status),
            retry_after,
        },
        _ => RenewalError::InvalidResponse {
            message: format!("Unexpected HTTP {}", status),
        },
    }
}

/// Get user-friendly error message.
pub fn get_user_message(error: &SessionError) -> String {
    match error {
        SessionError::Renewal(RenewalError::Rejected { .. }) | SessionError::NoSession => {
            "Your session has expired. Please sign in again.".to_string()
        }
        SessionError::Renewal(RenewalError::Transient { .. }) => {
            "We could not reach the sign-in service. Please check your connection.".to_string()
        }
        SessionError::Storage(_) => {
            "Your session could not be saved on this device. Please sign in again.".to_string()
        }
        _ => "An authentication error occurred. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(SessionError::from(RenewalError::transient("connection reset")).is_retryable());
        assert!(!SessionError::from(RenewalError::rejected("invalid_grant")).is_retryable());
        assert!(!SessionError::Renewal(RenewalError::InvalidResponse {
            message: "not json".to_string()
        })
        .is_retryable());
        assert!(!SessionError::NoSession.is_retryable());
    }

    #[test]
    fn test_needs_reauth() {
        assert!(SessionError::from(RenewalError::rejected("revoked")).needs_reauth());
        assert!(SessionError::NoSession.needs_reauth());
        assert!(!SessionError::from(RenewalError::transient("timeout")).needs_reauth());
    }

    #[test]
    fn test_retry_after() {
        let error = SessionError::from(RenewalError::Transient {
            message: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(7)),
        });
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(SessionError::NoSession.retry_after(), None);
    }

    #[test]
    fn test_invalid_grant_is_rejected() {
        let body = r#"{"error":"invalid_grant","error_description":"Refresh token expired"}"#;
        let error = create_error_from_response(400, body, None);
        assert_eq!(error, RenewalError::rejected("Refresh token expired"));
    }

    #[test]
    fn test_status_classification_without_body() {
        assert!(create_error_from_response(503, "", None).is_retryable());
        assert!(create_error_from_response(429, "", Some(Duration::from_secs(2))).is_retryable());
        assert!(!create_error_from_response(401, "", None).is_retryable());
        assert!(matches!(
            create_error_from_response(418, "", None),
            RenewalError::InvalidResponse { .. }
        ));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SessionError::from(RenewalError::transient("x")).error_code(),
            "SESSION_RENEWAL_TRANSIENT"
        );
        assert_eq!(SessionError::NoSession.error_code(), "SESSION_NONE");
    }
}
