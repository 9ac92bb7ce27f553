//! Token Endpoint
//!
//! Form-encoded POST to the token endpoint with client authentication.

use base64::Engine;
use secrecy::ExposeSecret;
use std::sync::Arc;

use crate::core::{HttpRequest, HttpTransport};
use crate::error::{map_token_endpoint_error, CarrierError};
use crate::types::{CarrierConfig, ClientAuthMethod, GrantType, TokenResponse};

/// Shared token endpoint client used by every grant.
pub struct TokenEndpoint {
    config: Arc<CarrierConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl TokenEndpoint {
    pub fn new(config: Arc<CarrierConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    /// Post `grant_type` plus `params` and parse the token response.
    pub async fn request(
        &self,
        grant_type: GrantType,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, CarrierError> {
        let request = self.build_request(grant_type, params);

        tracing::debug!(
            grant_type = grant_type.as_str(),
            url = %request.url,
            "requesting token"
        );

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            tracing::warn!(
                grant_type = grant_type.as_str(),
                status = response.status,
                "token endpoint rejected request"
            );
            return Err(map_token_endpoint_error(
                response.status,
                &response.body,
                response.retry_after(),
            ));
        }

        TokenResponse::from_body(&response.body)
    }

    /// Post a form to an arbitrary endpoint with the same client authentication.
    pub(crate) async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<crate::core::HttpResponse, CarrierError> {
        let request = self.authenticated_form(url, params);
        self.transport.send(request).await
    }

    fn build_request(&self, grant_type: GrantType, params: &[(&str, &str)]) -> HttpRequest {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("grant_type", grant_type.as_str()));
        all.extend_from_slice(params);
        self.authenticated_form(&self.config.provider.token_endpoint, &all)
    }

    fn authenticated_form(&self, url: &str, params: &[(&str, &str)]) -> HttpRequest {
        let credentials = &self.config.credentials;
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            form.append_pair(key, value);
        }

        let mut request = HttpRequest::post(url)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("accept", "application/json")
            .timeout(self.config.timeout);

        match credentials.auth_method {
            ClientAuthMethod::ClientSecretBasic => {
                let secret = credentials
                    .client_secret
                    .as_ref()
                    .map(|s| s.expose_secret().as_str())
                    .unwrap_or_default();
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", credentials.client_id, secret));
                request = request.header("authorization", format!("Basic {}", encoded));
            }
            ClientAuthMethod::ClientSecretPost => {
                form.append_pair("client_id", &credentials.client_id);
                if let Some(secret) = &credentials.client_secret {
                    form.append_pair("client_secret", secret.expose_secret());
                }
            }
            ClientAuthMethod::None => {
                form.append_pair("client_id", &credentials.client_id);
            }
        }

        request.body(form.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::carrier_config;
    use crate::core::{HttpResponse, MockHttpTransport};
    use crate::error::AuthFailureReason;

    fn endpoint(method: ClientAuthMethod, transport: Arc<MockHttpTransport>) -> TokenEndpoint {
        let config = carrier_config()
            .client_id("client")
            .client_secret("secret")
            .auth_method(method)
            .token_endpoint("https://auth.example.com/token")
            .build()
            .unwrap();
        TokenEndpoint::new(Arc::new(config), transport)
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({"access_token":"t","token_type":"Bearer","expires_in":3600}),
        );

        let endpoint = endpoint(ClientAuthMethod::ClientSecretBasic, transport.clone());
        let token = endpoint.request(GrantType::ClientCredentials, &[]).await.unwrap();
        assert_eq!(token.access_token.as_deref(), Some("t"));

        let request = transport.get_last_request().unwrap();
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Basic Y2xpZW50OnNlY3JldA==")
        );
        assert_eq!(request.body.as_deref(), Some("grant_type=client_credentials"));
    }

    #[tokio::test]
    async fn test_post_auth_puts_credentials_in_body() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({"access_token":"t","token_type":"Bearer","expires_in":3600}),
        );

        let endpoint = endpoint(ClientAuthMethod::ClientSecretPost, transport.clone());
        endpoint
            .request(GrantType::RefreshToken, &[("refresh_token", "r 1")])
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert!(!request.headers.contains_key("authorization"));
        assert_eq!(
            request.body.as_deref(),
            Some("grant_type=refresh_token&refresh_token=r+1&client_id=client&client_secret=secret")
        );
    }

    #[tokio::test]
    async fn test_error_statuses_are_classified() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse::new(400, r#"{"error":"invalid_client"}"#));
        transport.queue_response(HttpResponse::new(503, "").with_header("Retry-After", "4"));

        let endpoint = endpoint(ClientAuthMethod::ClientSecretBasic, transport);

        match endpoint.request(GrantType::ClientCredentials, &[]).await {
            Err(CarrierError::Auth(f)) => assert_eq!(f.reason, AuthFailureReason::InvalidClient),
            other => panic!("unexpected: {:?}", other),
        }

        let err = endpoint.request(GrantType::ClientCredentials, &[]).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(4)));
    }
}
