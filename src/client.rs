//! Carrier Auth Client
//!
//! Entry point for endpoint-specific clients: token acquisition, authenticated
//! execution, pagination and the authorization-code round trip.

use std::future::Future;
use std::sync::Arc;

use crate::builders::carrier_config;
use crate::core::{
    Clock, DefaultPkceGenerator, HttpRequest, HttpResponse, HttpTransport, PkceGenerator, ReqwestHttpTransport,
    SystemClock, DEFAULT_MAX_RESPONSE_SIZE,
};
use crate::error::CarrierError;
use crate::flows::{AuthorizationCodeFlowImpl, ClientCredentialsFlowImpl, TokenEndpoint};
use crate::pagination::CursorPaginator;
use crate::resilience::{ApiResponse, AuthenticatedCall, ResilientExecutor, RetryStats};
use crate::token::{AcquirerParts, CredentialStatus, DefaultTokenRevoker, TokenAcquirer};
use crate::types::{AuthCodeToken, AuthorizationRedirect, CarrierConfig, Grant, RequestContext};

/// Shared credential and request layer for carrier REST clients.
pub struct CarrierAuthClient {
    config: Arc<CarrierConfig>,
    acquirer: Arc<TokenAcquirer>,
    executor: Arc<ResilientExecutor>,
}

impl CarrierAuthClient {
    /// Create a client with the reqwest transport and system clock.
    pub fn new(config: CarrierConfig) -> Result<Self, CarrierError> {
        let transport = ReqwestHttpTransport::with_options(config.timeout, DEFAULT_MAX_RESPONSE_SIZE)?;
        Ok(Self::with_components(
            config,
            Arc::new(transport),
            Arc::new(SystemClock),
            Arc::new(DefaultPkceGenerator::new()),
        ))
    }

    /// Create a client configured from `CARRIER_*` environment variables.
    pub fn from_env() -> Result<Self, CarrierError> {
        Self::new(carrier_config().from_env().build()?)
    }

    /// Create a client with custom implementations.
    pub fn with_components(
        config: CarrierConfig,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        pkce: Arc<dyn PkceGenerator>,
    ) -> Self {
        let config = Arc::new(config);
        let endpoint = Arc::new(TokenEndpoint::new(config.clone(), transport.clone()));

        let acquirer = Arc::new(TokenAcquirer::new(AcquirerParts {
            config: config.clone(),
            clock,
            client_credentials: Arc::new(ClientCredentialsFlowImpl::new(endpoint.clone())),
            authorization_code: Arc::new(AuthorizationCodeFlowImpl::new(endpoint.clone())),
            pkce,
            revoker: Arc::new(DefaultTokenRevoker::new(endpoint)),
        }));
        let executor = Arc::new(ResilientExecutor::new(acquirer.clone(), transport));

        Self {
            config,
            acquirer,
            executor,
        }
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    /// Fresh request context tagged with the configured source tag.
    pub fn new_context(&self) -> RequestContext {
        RequestContext::new(self.config.source_tag.as_str())
    }

    /// A currently usable access token.
    pub async fn acquire_token(&self, grant: &Grant) -> Result<String, CarrierError> {
        self.acquirer.acquire(grant).await
    }

    /// Run one logical call with retries; a context is generated when none is given.
    pub async fn execute_authenticated<F, Fut>(
        &self,
        grant: &Grant,
        context: Option<RequestContext>,
        operation: F,
    ) -> Result<ApiResponse, CarrierError>
    where
        F: Fn(AuthenticatedCall) -> Fut,
        Fut: Future<Output = Result<HttpResponse, CarrierError>>,
    {
        let context = context.unwrap_or_else(|| self.new_context());
        self.executor.execute(grant, &context, operation).await
    }

    /// Send one request as a logical call over the configured transport.
    pub async fn send(
        &self,
        grant: &Grant,
        context: Option<RequestContext>,
        request: HttpRequest,
    ) -> Result<ApiResponse, CarrierError> {
        let context = context.unwrap_or_else(|| self.new_context());
        self.executor.send(grant, &context, request).await
    }

    /// Page through a bookmark-driven endpoint.
    pub fn paginate<B>(&self, grant: Grant, context: Option<RequestContext>, build: B) -> CursorPaginator<B>
    where
        B: Fn(Option<&str>) -> HttpRequest,
    {
        let context = context.unwrap_or_else(|| self.new_context());
        CursorPaginator::new(self.executor.clone(), grant, context, build)
    }

    /// Start the authorization-code flow for `session_key`.
    pub fn begin_authorization(
        &self,
        session_key: &str,
        scope: Option<&str>,
    ) -> Result<AuthorizationRedirect, CarrierError> {
        self.acquirer.begin_authorization(session_key, scope)
    }

    /// Finish the authorization-code flow with the code from the redirect.
    pub async fn complete_authorization(
        &self,
        session_key: &str,
        code: &str,
        pending_verifier: &str,
    ) -> Result<AuthCodeToken, CarrierError> {
        self.acquirer
            .complete_authorization(session_key, code, pending_verifier)
            .await
    }

    /// Finish the authorization-code flow, rejecting a redirect whose `state`
    /// differs from the one issued by [`CarrierAuthClient::begin_authorization`].
    pub async fn complete_authorization_with_state(
        &self,
        session_key: &str,
        code: &str,
        pending_verifier: &str,
        state: &str,
    ) -> Result<AuthCodeToken, CarrierError> {
        self.acquirer
            .complete_authorization_with_state(session_key, code, pending_verifier, state)
            .await
    }

    /// Drop the session's credential and pending authorization.
    pub async fn revoke(&self, session_key: &str) {
        self.acquirer.revoke(session_key).await
    }

    pub fn credential_status(&self, grant: &Grant) -> Option<CredentialStatus> {
        self.acquirer.credential_status(grant)
    }

    pub fn retry_stats(&self) -> RetryStats {
        self.executor.stats()
    }
}

impl std::fmt::Debug for CarrierAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierAuthClient")
            .field("token_endpoint", &self.config.provider.token_endpoint)
            .field("client_id", &self.config.credentials.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MockClock, MockHttpTransport, MockPkceGenerator};
    use std::time::Duration;

    fn client(transport: Arc<MockHttpTransport>, clock: Arc<MockClock>) -> CarrierAuthClient {
        let config = carrier_config()
            .client_id("client")
            .client_secret("secret")
            .base_url("https://onlinetools.example.com")
            .redirect_uri("https://app.example.com/cb")
            .source_tag("orders-service")
            .build()
            .unwrap();
        let pkce = Arc::new(MockPkceGenerator::new());
        pkce.set_next_verifier("v".repeat(64));
        CarrierAuthClient::with_components(config, transport, clock, pkce)
    }

    #[tokio::test]
    async fn test_authorization_round_trip_and_refresh() {
        let transport = Arc::new(MockHttpTransport::new());
        let clock = Arc::new(MockClock::new());
        let client = client(transport.clone(), clock.clone());

        let redirect = client.begin_authorization("user-9", Some("read")).unwrap();
        assert!(redirect.redirect_url.contains("code_challenge_method=S256"));
        assert_eq!(redirect.pending_verifier, "v".repeat(64));

        transport.queue_json_response(
            200,
            &serde_json::json!({
                "access_token": "a1", "token_type": "Bearer", "expires_in": "3600",
                "refresh_token": "r1", "refresh_token_expires_in": "86400"
            }),
        );
        let token = client
            .complete_authorization("user-9", "code-1", &redirect.pending_verifier)
            .await
            .unwrap();
        assert_eq!(token.refresh_secret(), "r1");

        let grant = Grant::session("user-9");
        assert_eq!(client.acquire_token(&grant).await.unwrap(), "a1");

        clock.advance(Duration::from_secs(3600));
        transport.queue_json_response(
            200,
            &serde_json::json!({
                "access_token": "a2", "token_type": "Bearer", "expires_in": 3600,
                "refresh_token": "r2", "refresh_token_expires_in": 86400
            }),
        );
        assert_eq!(client.acquire_token(&grant).await.unwrap(), "a2");

        let status = client.credential_status(&grant).unwrap();
        assert!(status.usable);

        client.revoke("user-9").await;
        assert!(client.acquire_token(&grant).await.unwrap_err().needs_reauth());
    }

    #[tokio::test]
    async fn test_default_context_uses_source_tag() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.route(
            "/oauth/token",
            Ok(HttpResponse::json(
                200,
                &serde_json::json!({"access_token": "t", "token_type": "Bearer", "expires_in": 3600}),
            )),
        );
        transport.queue_response(HttpResponse::new(200, "{}"));
        let client = client(transport.clone(), Arc::new(MockClock::new()));

        let response = client
            .send(
                &Grant::ClientCredentials,
                None,
                HttpRequest::get("https://onlinetools.example.com/api/track/v1/details/1Z"),
            )
            .await
            .unwrap();

        let request = transport.requests_to("/api/").pop().unwrap();
        assert_eq!(request.headers["transactionSrc"], "orders-service");
        assert_eq!(request.headers["transId"], response.correlation_id);
        assert_eq!(client.retry_stats().calls, 1);
    }
}
