//! Configuration Types
//!
//! Client configuration for the carrier credential and request layer.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::RetryConfig;

/// Time subtracted from every stated expiry before a token is considered dead.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Default configuration values.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PENDING_AUTHORIZATION_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_SOURCE_TAG: &str = "carrier-auth";

/// Carrier client configuration.
#[derive(Clone, Debug)]
pub struct CarrierConfig {
    /// Provider endpoints.
    pub provider: ProviderConfig,
    /// Client credentials.
    pub credentials: ClientCredentials,
    /// Scopes requested when the caller names none.
    pub default_scopes: Vec<String>,
    /// Timeout applied to each HTTP attempt.
    pub timeout: Duration,
    /// Retry policy for authenticated calls.
    pub retry: RetryConfig,
    /// Source tag used when a caller does not supply a request context.
    pub source_tag: String,
    /// How long a started authorization may wait for its redirect.
    pub pending_authorization_ttl: Duration,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            credentials: ClientCredentials::default(),
            default_scopes: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            pending_authorization_ttl: DEFAULT_PENDING_AUTHORIZATION_TTL,
        }
    }
}

/// Provider endpoint configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the downstream APIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Token endpoint URL (all grants, including refresh).
    pub token_endpoint: String,
    /// Authorization endpoint URL (authorization-code flow).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    /// Token revocation endpoint (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    /// Redirect URI registered for the authorization-code flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

/// Client credentials.
#[derive(Clone, Default)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret (for confidential clients).
    pub client_secret: Option<SecretString>,
    /// Client authentication method.
    pub auth_method: ClientAuthMethod,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client authentication method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// HTTP Basic Authentication header.
    #[default]
    ClientSecretBasic,
    /// client_id and client_secret in request body.
    ClientSecretPost,
    /// No client authentication (public client).
    None,
}

/// Grant type sent to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_grant_type_as_str() {
        assert_eq!(GrantType::AuthorizationCode.as_str(), "authorization_code");
        assert_eq!(GrantType::ClientCredentials.as_str(), "client_credentials");
        assert_eq!(GrantType::RefreshToken.as_str(), "refresh_token");
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = ClientCredentials {
            client_id: "client".to_string(),
            client_secret: Some(SecretString::new("hunter2".to_string())),
            auth_method: ClientAuthMethod::ClientSecretBasic,
        };
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_config_defaults() {
        let config = CarrierConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.source_tag, "carrier-auth");
        assert_eq!(SAFETY_MARGIN, Duration::from_secs(60));
    }
}
