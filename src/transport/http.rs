//! HTTP Renewal Transport
//!
//! RFC 6749 Section 6 refresh grant against a token endpoint.

use async_trait::async_trait;
use base64::Engine;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{Clock, HttpRequest, HttpTransport, ReqwestHttpTransport, SystemClock};
use crate::error::{create_error_from_response, ConfigurationError, RenewalError};
use crate::transport::RenewalTransport;
use crate::types::{ClientAuthMethod, HttpRenewalConfig, TokenResponse, TokenTriple};

/// Renewal transport speaking the OAuth2 refresh grant.
pub struct HttpRenewalTransport<T: HttpTransport = ReqwestHttpTransport> {
    config: HttpRenewalConfig,
    http: Arc<T>,
    clock: Arc<dyn Clock>,
}

impl HttpRenewalTransport<ReqwestHttpTransport> {
    /// Create transport using reqwest with the configured timeout.
    ///
    /// # Errors
    ///
    /// Fails if the reqwest client cannot be built.
    pub fn new(config: HttpRenewalConfig) -> Result<Self, ConfigurationError> {
        let http = Arc::new(ReqwestHttpTransport::with_options(config.timeout, 1048576)?);
        Ok(Self::with_transport(config, http))
    }
}

impl<T: HttpTransport> HttpRenewalTransport<T> {
    /// Create transport over a custom HTTP transport.
    pub fn with_transport(config: HttpRenewalConfig, http: Arc<T>) -> Self {
        Self {
            config,
            http,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a custom clock for computing absolute expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn build_body(&self, refresh_token: &str) -> String {
        let credentials = &self.config.credentials;
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "refresh_token");
        form.append_pair("refresh_token", refresh_token);

        if !self.config.scopes.is_empty() {
            form.append_pair("scope", &self.config.scopes.join(" "));
        }

        match credentials.auth_method {
            ClientAuthMethod::ClientSecretPost => {
                form.append_pair("client_id", &credentials.client_id);
                if let Some(secret) = &credentials.client_secret {
                    form.append_pair("client_secret", secret.expose_secret());
                }
            }
            ClientAuthMethod::None => {
                form.append_pair("client_id", &credentials.client_id);
            }
            ClientAuthMethod::ClientSecretBasic => {}
        }

        form.finish()
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());

        let credentials = &self.config.credentials;
        if credentials.auth_method == ClientAuthMethod::ClientSecretBasic {
            if let Some(secret) = &credentials.client_secret {
                let pair = format!("{}:{}", credentials.client_id, secret.expose_secret());
                let encoded = base64::engine::general_purpose::STANDARD.encode(pair);
                headers.insert("authorization".to_string(), format!("Basic {}", encoded));
            }
        }

        headers
    }

    fn into_triple(
        &self,
        response: TokenResponse,
        presented_refresh_token: &str,
    ) -> Result<TokenTriple, RenewalError> {
        let now = self.clock.now();
        let expires_at = match response.expires_in {
            Some(secs) => i64::try_from(secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .ok_or_else(|| RenewalError::InvalidResponse {
                    message: format!("Token lifetime out of range: expires_in={}", secs),
                })?,
            None => expiry_from_access_token(&response.access_token).ok_or_else(|| {
                RenewalError::InvalidResponse {
                    message: "Token response has neither expires_in nor a JWT exp claim"
                        .to_string(),
                }
            })?,
        };

        // Providers that do not rotate refresh tokens omit it from the response.
        let refresh_token = response
            .refresh_token
            .unwrap_or_else(|| presented_refresh_token.to_string());

        Ok(TokenTriple::new(response.access_token, refresh_token, expires_at))
    }
}

#[cfg(feature = "jwt")]
fn expiry_from_access_token(access_token: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    crate::token::expiry_from_jwt(access_token)
}

#[cfg(not(feature = "jwt"))]
fn expiry_from_access_token(_access_token: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    None
}

#[async_trait]
impl<T: HttpTransport> RenewalTransport for HttpRenewalTransport<T> {
    async fn renew(&self, refresh_token: &str) -> Result<TokenTriple, RenewalError> {
        let request = HttpRequest {
            url: self.config.token_endpoint.to_string(),
            headers: self.build_headers(),
            body: self.build_body(refresh_token),
            timeout: Some(self.config.timeout),
        };

        debug!(endpoint = %self.config.token_endpoint, "Sending refresh grant");
        let response = self.http.post(request).await?;

        if response.status != 200 {
            let error = create_error_from_response(
                response.status,
                &response.body,
                response.retry_after(),
            );
            warn!(
                endpoint = %self.config.token_endpoint,
                status = response.status,
                retryable = error.is_retryable(),
                "Refresh grant failed"
            );
            return Err(error);
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| RenewalError::InvalidResponse {
                message: e.to_string(),
            })?;

        self.into_triple(token_response, refresh_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ManualClock, MockHttpTransport};
    use crate::types::ClientCredentials;
    use chrono::Utc;
    use secrecy::SecretString;
    use std::time::Duration;

    fn config(auth_method: ClientAuthMethod) -> HttpRenewalConfig {
        HttpRenewalConfig {
            token_endpoint: url::Url::parse("https://auth.example.com/token").unwrap(),
            credentials: ClientCredentials {
                client_id: "app".to_string(),
                client_secret: Some(SecretString::new("s3cret".to_string())),
                auth_method,
            },
            scopes: Vec::new(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_successful_refresh_computes_absolute_expiry() {
        let now = Utc::now();
        let http = Arc::new(MockHttpTransport::new());
        http.queue_json_response(
            200,
            serde_json::json!({
                "access_token": "new-access",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "new-refresh"
            }),
        );

        let transport = HttpRenewalTransport::with_transport(
            config(ClientAuthMethod::ClientSecretBasic),
            http.clone(),
        )
        .with_clock(Arc::new(ManualClock::new(now)));

        let triple = transport.renew("old-refresh").await.unwrap();
        assert_eq!(triple.access_token(), "new-access");
        assert_eq!(triple.refresh_token(), "new-refresh");
        assert_eq!(triple.expires_at(), now + chrono::Duration::seconds(3600));

        let request = &http.get_requests()[0];
        assert!(request.body.contains("grant_type=refresh_token"));
        assert!(request.body.contains("refresh_token=old-refresh"));
        assert!(!request.body.contains("client_secret"));
        assert!(request.headers["authorization"].starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_refresh_token_preserved_when_not_rotated() {
        let http = Arc::new(MockHttpTransport::new());
        http.queue_json_response(
            200,
            serde_json::json!({"access_token": "a", "expires_in": 60}),
        );

        let transport = HttpRenewalTransport::with_transport(
            config(ClientAuthMethod::ClientSecretPost),
            http.clone(),
        );
        let triple = transport.renew("keep-me").await.unwrap();
        assert_eq!(triple.refresh_token(), "keep-me");

        let request = &http.get_requests()[0];
        assert!(request.body.contains("client_id=app"));
        assert!(request.body.contains("client_secret=s3cret"));
        assert!(!request.headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_invalid_grant_is_rejected() {
        let http = Arc::new(MockHttpTransport::new());
        http.queue_json_response(
            400,
            serde_json::json!({"error": "invalid_grant", "error_description": "revoked"}),
        );

        let transport = HttpRenewalTransport::with_transport(config(ClientAuthMethod::None), http);
        let error = transport.renew("dead").await.unwrap_err();
        assert_eq!(error, RenewalError::rejected("revoked"));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let http = Arc::new(MockHttpTransport::new());
        http.queue_json_response(503, serde_json::json!({"message": "maintenance"}));

        let transport = HttpRenewalTransport::with_transport(config(ClientAuthMethod::None), http);
        assert!(transport.renew("r").await.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_is_invalid_response() {
        let http = Arc::new(MockHttpTransport::new());
        http.queue_json_response(
            200,
            serde_json::json!({"access_token": "a", "expires_in": 9_000_000_000_000_000u64}),
        );

        let transport = HttpRenewalTransport::with_transport(config(ClientAuthMethod::None), http);
        assert!(matches!(
            transport.renew("r").await,
            Err(RenewalError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_expiry_is_invalid_response() {
        let http = Arc::new(MockHttpTransport::new());
        http.queue_json_response(200, serde_json::json!({"access_token": "opaque"}));

        let transport = HttpRenewalTransport::with_transport(config(ClientAuthMethod::None), http);
        assert!(matches!(
            transport.renew("r").await,
            Err(RenewalError::InvalidResponse { .. })
        ));
    }
}
