//! Carrier Auth
//!
//! Shared OAuth credential and resilient request layer for carrier REST API
//! clients (address validation, rating, shipping, tracking and the rest).
//!
//! # Features
//!
//! - Client Credentials Flow (RFC 6749 Section 4.4)
//! - Authorization Code with PKCE (RFC 6749 Section 4.1, RFC 7636)
//! - Token Refresh with refresh-token rotation (RFC 6749 Section 6)
//! - Token Revocation (RFC 7009)
//! - Single-flight token fetches with identity compare-and-swap stores
//! - Retries with exponential backoff, jitter and `Retry-After`
//! - Correlation headers (`transId`, `transactionSrc`) stable across retries
//! - Bookmark-driven cursor pagination
//!
//! # Example
//!
//! ```rust,ignore
//! use carrier_auth::{carrier_config, CarrierAuthClient, Grant, HttpRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = carrier_config()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .base_url("https://wwwcie.example.com")
//!         .source_tag("rating-service")
//!         .build()?;
//!
//!     let client = CarrierAuthClient::new(config)?;
//!
//!     let response = client
//!         .send(
//!             &Grant::ClientCredentials,
//!             None,
//!             HttpRequest::post("https://wwwcie.example.com/api/rating/v2403/Rate")
//!                 .json(&serde_json::json!({"RateRequest": {}})),
//!         )
//!         .await?;
//!
//!     println!("{} (correlation id {})", response.status, response.correlation_id);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: credentials, request context and configuration types
//! - `error`: error hierarchy and downstream error-body parsing
//! - `core`: clock and backoff, HTTP transport, PKCE, pending authorizations
//! - `flows`: token endpoint and the two grants
//! - `token`: credential stores, single-flight fetch, acquirer, revocation
//! - `resilience`: retry policy and the resilient executor
//! - `pagination`: cursor paginator
//! - `builders`: fluent configuration builder
//! - `client`: facade combining all of the above

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod pagination;
pub mod resilience;
pub mod token;
pub mod types;

// Re-export main client
pub use client::CarrierAuthClient;

// Re-export builders
pub use builders::{carrier_config, CarrierConfigBuilder};

// Re-export errors
pub use error::{
    is_retryable_status, map_token_endpoint_error, parse_downstream_errors, AuthFailure, AuthFailureReason,
    CarrierError, CarrierResult, ClientFailure, ConfigurationError, DownstreamError, OAuthErrorResponse,
    ProtocolError, TransportError,
};

// Re-export types
pub use types::{
    // Config
    CarrierConfig, ClientAuthMethod, ClientCredentials, GrantType, ProviderConfig, MAX_TOKEN_LIFETIME, SAFETY_MARGIN,
    // Token
    AuthCodeToken, ClientCredentialsToken, Credential, TokenResponse,
    // Auth
    AuthorizationRedirect, Grant, PkceParams,
    // Context
    generate_correlation_id, RequestContext, CORRELATION_HEADER, MAX_SOURCE_TAG_LEN, SOURCE_TAG_HEADER,
};

// Re-export core components
pub use core::{
    // Clock
    backoff_delay, Clock, MockClock, SystemClock,
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
    // PKCE
    compute_challenge, DefaultPkceGenerator, MockPkceGenerator, PkceGenerator,
    // Pending authorizations
    PendingAuthorizations,
};

// Re-export flows
pub use flows::{
    AuthorizationCodeFlow, AuthorizationCodeFlowImpl, ClientCredentialsFlow, ClientCredentialsFlowImpl,
    TokenEndpoint,
};

// Re-export token management
pub use token::{
    AcquirerParts, CredentialStatus, CredentialStore, DefaultTokenRevoker, SingleFlight, TokenAcquirer,
    TokenRevoker, TokenTypeHint,
};

// Re-export resilience
pub use resilience::{
    ApiResponse, AuthenticatedCall, ResilientExecutor, RetryBudget, RetryConfig, RetryStats, DEFAULT_RETRY_CONFIG,
};

// Re-export pagination
pub use pagination::{with_json_bookmark, with_query_bookmark, BookmarkLocation, CursorPaginator, Page};
