//! Integration tests using WireMock
//!
//! These drive the real reqwest transport against a mock carrier: token
//! endpoint, authenticated APIs and a paged search endpoint.

mod executor;
mod pagination;
mod token;

use carrier_auth::{carrier_config, CarrierAuthClient, RetryConfig};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/security/v1/oauth/token";
pub const SOURCE_TAG: &str = "integration-tests";

/// Client pointed at `server`, with short retry delays.
pub fn client(server: &MockServer) -> CarrierAuthClient {
    let config = carrier_config()
        .client_id("client")
        .client_secret("secret")
        .base_url(server.uri())
        .redirect_uri("https://app.example.com/callback")
        .source_tag(SOURCE_TAG)
        .timeout(Duration::from_secs(2))
        .retry(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        })
        .build()
        .expect("valid config");

    CarrierAuthClient::new(config).expect("client")
}

pub fn token_body(access: &str) -> serde_json::Value {
    json!({
        "token_type": "Bearer",
        "issued_at": "1700000000000",
        "client_id": "client",
        "access_token": access,
        "expires_in": "14399",
        "status": "approved"
    })
}

/// Token endpoint that always hands out `access`.
pub async fn mount_token(server: &MockServer, access: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access)))
        .mount(server)
        .await;
}

pub fn api_url(server: &MockServer, suffix: &str) -> String {
    format!("{}{}", server.uri(), suffix)
}
