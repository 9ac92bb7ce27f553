//! Token Revocation
//!
//! RFC 7009 - OAuth 2.0 Token Revocation.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{map_token_endpoint_error, CarrierError, ConfigurationError};
use crate::flows::TokenEndpoint;

/// Which kind of token is being revoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Token revoker interface.
#[async_trait]
pub trait TokenRevoker: Send + Sync {
    /// Revoke a token.
    async fn revoke(&self, token: &str, hint: TokenTypeHint) -> Result<(), CarrierError>;
}

/// Default token revoker implementation.
pub struct DefaultTokenRevoker {
    endpoint: Arc<TokenEndpoint>,
}

impl DefaultTokenRevoker {
    /// Create new token revoker.
    pub fn new(endpoint: Arc<TokenEndpoint>) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl TokenRevoker for DefaultTokenRevoker {
    async fn revoke(&self, token: &str, hint: TokenTypeHint) -> Result<(), CarrierError> {
        let url = self
            .endpoint
            .config()
            .provider
            .revocation_endpoint
            .clone()
            .ok_or_else(|| {
                CarrierError::Configuration(ConfigurationError::MissingRequired {
                    field: "revocation_endpoint".to_string(),
                })
            })?;

        let response = self
            .endpoint
            .post_form(&url, &[("token", token), ("token_type_hint", hint.as_str())])
            .await?;

        // RFC 7009: 200 both for a revoked token and for one the server did not know.
        if !response.is_success() {
            return Err(map_token_endpoint_error(
                response.status,
                &response.body,
                response.retry_after(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::carrier_config;
    use crate::core::{HttpResponse, MockHttpTransport};

    fn revoker(transport: Arc<MockHttpTransport>, with_endpoint: bool) -> DefaultTokenRevoker {
        let mut builder = carrier_config()
            .client_id("client")
            .client_secret("secret")
            .token_endpoint("https://auth.example.com/token");
        if with_endpoint {
            builder = builder.revocation_endpoint("https://auth.example.com/revoke");
        }
        let endpoint = TokenEndpoint::new(Arc::new(builder.build().unwrap()), transport);
        DefaultTokenRevoker::new(Arc::new(endpoint))
    }

    #[tokio::test]
    async fn test_revoke_posts_token() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse::new(200, ""));

        revoker(transport.clone(), true)
            .revoke("r1", TokenTypeHint::RefreshToken)
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.url, "https://auth.example.com/revoke");
        assert_eq!(
            request.body.as_deref(),
            Some("token=r1&token_type_hint=refresh_token")
        );
    }

    #[tokio::test]
    async fn test_revoke_without_endpoint() {
        let transport = Arc::new(MockHttpTransport::new());
        let result = revoker(transport.clone(), false)
            .revoke("r1", TokenTypeHint::RefreshToken)
            .await;

        assert!(matches!(result, Err(CarrierError::Configuration(_))));
        assert!(transport.get_requests().is_empty());
    }
}
