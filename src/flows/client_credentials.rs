//! Client Credentials Flow
//!
//! RFC 6749 Section 4.4 - Client Credentials Grant.

use async_trait::async_trait;
use std::sync::Arc;

use super::TokenEndpoint;
use crate::error::CarrierError;
use crate::types::{GrantType, TokenResponse};

/// Client Credentials Flow interface.
#[async_trait]
pub trait ClientCredentialsFlow: Send + Sync {
    /// Request an access token for the configured account.
    async fn request_token(&self) -> Result<TokenResponse, CarrierError>;
}

/// Client Credentials Flow implementation.
pub struct ClientCredentialsFlowImpl {
    endpoint: Arc<TokenEndpoint>,
}

impl ClientCredentialsFlowImpl {
    /// Create new Client Credentials Flow.
    pub fn new(endpoint: Arc<TokenEndpoint>) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ClientCredentialsFlow for ClientCredentialsFlowImpl {
    async fn request_token(&self) -> Result<TokenResponse, CarrierError> {
        let scope = self.endpoint.config().default_scopes.join(" ");
        let params: Vec<(&str, &str)> = if scope.is_empty() {
            Vec::new()
        } else {
            vec![("scope", scope.as_str())]
        };

        self.endpoint
            .request(GrantType::ClientCredentials, &params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::carrier_config;
    use crate::core::MockHttpTransport;

    #[tokio::test]
    async fn test_request_token_sends_default_scopes() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({
                "access_token": "cc-token",
                "token_type": "Bearer",
                "expires_in": "14399",
                "status": "approved"
            }),
        );

        let config = carrier_config()
            .client_id("id")
            .client_secret("secret")
            .token_endpoint("https://auth.example.com/token")
            .add_default_scope("rating")
            .add_default_scope("shipping")
            .build()
            .unwrap();
        let flow = ClientCredentialsFlowImpl::new(Arc::new(TokenEndpoint::new(
            Arc::new(config),
            transport.clone(),
        )));

        let token = flow.request_token().await.unwrap();
        assert_eq!(token.access_token.as_deref(), Some("cc-token"));
        assert_eq!(token.expires_in, Some(14399));

        let request = transport.get_last_request().unwrap();
        assert_eq!(
            request.body.as_deref(),
            Some("grant_type=client_credentials&scope=rating+shipping")
        );
    }
}
