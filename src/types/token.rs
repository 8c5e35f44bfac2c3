//! Token Types
//!
//! The token triple maintained by the session manager and the wire shapes
//! used to produce it.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Access token, refresh token and absolute expiry, always together.
///
/// A session either has a complete triple or none at all; there is no way to
/// construct or persist a triple with a missing field.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenTriple {
    #[serde(serialize_with = "serialize_secret")]
    access_token: SecretString,
    #[serde(serialize_with = "serialize_secret")]
    refresh_token: SecretString,
    expires_at: DateTime<Utc>,
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl TokenTriple {
    /// Create a new token triple.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            refresh_token: SecretString::new(refresh_token.into()),
            expires_at,
        }
    }

    /// Access token value (for the Authorization header).
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Refresh token value.
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    /// Absolute expiry of the access token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Short, non-reversible identifier of the access token for log correlation.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.access_token().as_bytes());
        hex::encode(&digest[..4])
    }
}

impl PartialEq for TokenTriple {
    fn eq(&self, other: &Self) -> bool {
        self.access_token() == other.access_token()
            && self.refresh_token() == other.refresh_token()
            && self.expires_at == other.expires_at
    }
}

impl Eq for TokenTriple {}

impl std::fmt::Debug for TokenTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTriple")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// One coordinated renewal, kept only in memory for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenewalAttempt {
    /// 0 for the first try, incremented on every retry.
    pub attempt_number: u32,
    /// When the attempt was started.
    pub started_at: DateTime<Utc>,
}

/// Token response from a refresh grant.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Rotated refresh token, if the provider issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}
