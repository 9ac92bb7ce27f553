//! Configuration Builder
//!
//! Fluent builder for carrier client configuration.

use std::time::Duration;

use crate::error::{CarrierError, ConfigurationError};
use crate::resilience::RetryConfig;
use crate::types::{
    CarrierConfig, ClientAuthMethod, ClientCredentials, ProviderConfig, DEFAULT_PENDING_AUTHORIZATION_TTL,
    DEFAULT_SOURCE_TAG, DEFAULT_TIMEOUT,
};
use secrecy::SecretString;

const TOKEN_PATH: &str = "/security/v1/oauth/token";
const AUTHORIZE_PATH: &str = "/security/v1/oauth/authorize";

/// Carrier configuration builder.
#[derive(Default)]
pub struct CarrierConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_method: Option<ClientAuthMethod>,
    base_url: Option<String>,
    token_endpoint: Option<String>,
    authorization_endpoint: Option<String>,
    revocation_endpoint: Option<String>,
    redirect_uri: Option<String>,
    default_scopes: Vec<String>,
    timeout: Option<Duration>,
    retry: Option<RetryConfig>,
    source_tag: Option<String>,
    pending_authorization_ttl: Option<Duration>,
}

impl CarrierConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = Some(method);
        self
    }

    /// Set the API base URL. Unset OAuth endpoints are derived from it.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set authorization endpoint.
    pub fn authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(endpoint.into());
        self
    }

    /// Set revocation endpoint.
    pub fn revocation_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.revocation_endpoint = Some(endpoint.into());
        self
    }

    /// Set the redirect URI registered for the authorization-code flow.
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Set default scopes.
    pub fn default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Add a default scope.
    pub fn add_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scopes.push(scope.into());
        self
    }

    /// Set per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the whole retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set maximum number of retries.
    pub fn max_retries(mut self, max_attempts: u32) -> Self {
        self.retry.get_or_insert_with(RetryConfig::default).max_attempts = max_attempts;
        self
    }

    /// Set delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.retry.get_or_insert_with(RetryConfig::default).base_delay = delay;
        self
    }

    /// Set the cap on retry delays.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.retry.get_or_insert_with(RetryConfig::default).max_delay = delay;
        self
    }

    /// Set the default source tag.
    pub fn source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = Some(tag.into());
        self
    }

    /// Set how long a started authorization stays pending.
    pub fn pending_authorization_ttl(mut self, ttl: Duration) -> Self {
        self.pending_authorization_ttl = Some(ttl);
        self
    }

    /// Fill unset fields from `CARRIER_*` environment variables.
    pub fn from_env(self) -> Self {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.client_id.is_none() {
            self.client_id = get("CARRIER_CLIENT_ID");
        }
        if self.client_secret.is_none() {
            self.client_secret = get("CARRIER_CLIENT_SECRET").map(SecretString::new);
        }
        if self.base_url.is_none() {
            self.base_url = get("CARRIER_BASE_URL");
        }
        if self.token_endpoint.is_none() {
            self.token_endpoint = get("CARRIER_TOKEN_URL");
        }
        if self.authorization_endpoint.is_none() {
            self.authorization_endpoint = get("CARRIER_AUTHORIZE_URL");
        }
        if self.source_tag.is_none() {
            self.source_tag = get("CARRIER_SOURCE_TAG");
        }
        if self.redirect_uri.is_none() {
            self.redirect_uri = get("CARRIER_REDIRECT_URI");
        }
        self
    }

    /// Build the carrier configuration.
    pub fn build(self) -> Result<CarrierConfig, CarrierError> {
        let client_id = self.client_id.ok_or_else(|| missing("client_id"))?;

        let base_url = self
            .base_url
            .map(|b| b.trim_end_matches('/').to_string());

        let token_endpoint = self
            .token_endpoint
            .or_else(|| base_url.as_ref().map(|b| format!("{}{}", b, TOKEN_PATH)))
            .ok_or_else(|| missing("token_endpoint"))?;

        let authorization_endpoint = self
            .authorization_endpoint
            .or_else(|| base_url.as_ref().map(|b| format!("{}{}", b, AUTHORIZE_PATH)));

        let auth_method = self.auth_method.unwrap_or_default();

        if matches!(
            auth_method,
            ClientAuthMethod::ClientSecretBasic | ClientAuthMethod::ClientSecretPost
        ) && self.client_secret.is_none()
        {
            return Err(missing("client_secret"));
        }

        for url in [Some(&token_endpoint), authorization_endpoint.as_ref()]
            .into_iter()
            .chain([
                base_url.as_ref(),
                self.revocation_endpoint.as_ref(),
                self.redirect_uri.as_ref(),
            ])
            .flatten()
        {
            validate_url(url)?;
        }

        let retry = self.retry.unwrap_or_default();
        if retry.base_delay > retry.max_delay {
            return Err(CarrierError::Configuration(ConfigurationError::InvalidConfig {
                message: "base_delay must not exceed max_delay".to_string(),
            }));
        }

        Ok(CarrierConfig {
            provider: ProviderConfig {
                base_url,
                token_endpoint,
                authorization_endpoint,
                revocation_endpoint: self.revocation_endpoint,
                redirect_uri: self.redirect_uri,
            },
            credentials: ClientCredentials {
                client_id,
                client_secret: self.client_secret,
                auth_method,
            },
            default_scopes: self.default_scopes,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            retry,
            source_tag: self
                .source_tag
                .unwrap_or_else(|| DEFAULT_SOURCE_TAG.to_string()),
            pending_authorization_ttl: self
                .pending_authorization_ttl
                .unwrap_or(DEFAULT_PENDING_AUTHORIZATION_TTL),
        })
    }
}

fn missing(field: &str) -> CarrierError {
    CarrierError::Configuration(ConfigurationError::MissingRequired {
        field: field.to_string(),
    })
}

fn validate_url(url: &str) -> Result<(), CarrierError> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(CarrierError::Configuration(ConfigurationError::InvalidEndpoint {
            url: url.to_string(),
        })),
    }
}

/// Create a new carrier configuration builder.
pub fn carrier_config() -> CarrierConfigBuilder {
    CarrierConfigBuilder::new()
}
