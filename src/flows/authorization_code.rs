//! Authorization Code Flow
//!
//! RFC 6749 Section 4.1 with RFC 7636 PKCE, plus the refresh grant that keeps
//! a session alive.

use async_trait::async_trait;
use std::sync::Arc;

use super::TokenEndpoint;
use crate::error::{CarrierError, ConfigurationError};
use crate::types::{GrantType, PkceParams, TokenResponse};

/// Authorization Code Flow interface.
#[async_trait]
pub trait AuthorizationCodeFlow: Send + Sync {
    /// Build the authorization URL the user is redirected to.
    fn build_authorization_url(
        &self,
        pkce: &PkceParams,
        state: &str,
        scope: Option<&str>,
    ) -> Result<String, CarrierError>;

    /// Exchange an authorization code and its PKCE verifier for tokens.
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse, CarrierError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, CarrierError>;
}

/// Authorization Code Flow implementation.
pub struct AuthorizationCodeFlowImpl {
    endpoint: Arc<TokenEndpoint>,
}

impl AuthorizationCodeFlowImpl {
    /// Create new Authorization Code Flow.
    pub fn new(endpoint: Arc<TokenEndpoint>) -> Self {
        Self { endpoint }
    }

    fn redirect_uri(&self) -> Result<&str, CarrierError> {
        self.endpoint
            .config()
            .provider
            .redirect_uri
            .as_deref()
            .ok_or_else(|| {
                CarrierError::Configuration(ConfigurationError::MissingRequired {
                    field: "redirect_uri".to_string(),
                })
            })
    }
}

#[async_trait]
impl AuthorizationCodeFlow for AuthorizationCodeFlowImpl {
    fn build_authorization_url(
        &self,
        pkce: &PkceParams,
        state: &str,
        scope: Option<&str>,
    ) -> Result<String, CarrierError> {
        let config = self.endpoint.config();
        let endpoint = config.provider.authorization_endpoint.as_deref().ok_or_else(|| {
            CarrierError::Configuration(ConfigurationError::MissingRequired {
                field: "authorization_endpoint".to_string(),
            })
        })?;

        let default_scope = config.default_scopes.join(" ");
        let scope = scope.unwrap_or(&default_scope);

        let mut params = vec![
            ("client_id", config.credentials.client_id.as_str()),
            ("redirect_uri", self.redirect_uri()?),
            ("response_type", "code"),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope));
        }
        params.push(("state", state));
        params.push(("code_challenge", pkce.code_challenge.as_str()));
        params.push(("code_challenge_method", PkceParams::CHALLENGE_METHOD));

        let url = url::Url::parse_with_params(endpoint, &params).map_err(|_| {
            CarrierError::Configuration(ConfigurationError::InvalidEndpoint {
                url: endpoint.to_string(),
            })
        })?;

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse, CarrierError> {
        let redirect_uri = self.redirect_uri()?;
        self.endpoint
            .request(
                GrantType::AuthorizationCode,
                &[
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                    ("code_verifier", code_verifier),
                ],
            )
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, CarrierError> {
        self.endpoint
            .request(GrantType::RefreshToken, &[("refresh_token", refresh_token)])
            .await
    }
}
