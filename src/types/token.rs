//! Token Types
//!
//! Token endpoint responses and the credentials built from them.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::time::{Duration, Instant};

use crate::error::{AuthFailure, AuthFailureReason, CarrierError};

/// Token response from the token endpoint.
///
/// Numeric lifetimes are accepted either as JSON numbers or as decimal
/// strings; some carrier gateways send `"expires_in": "14399"`.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: Option<String>,
    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub expires_in: Option<u64>,
    /// Refresh token (authorization-code flow only).
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Refresh token lifetime in seconds.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub refresh_token_expires_in: Option<u64>,
    /// Granted scope.
    #[serde(default)]
    pub scope: Option<String>,
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl TokenResponse {
    /// Parse a token endpoint body.
    pub fn from_body(body: &str) -> Result<Self, CarrierError> {
        serde_json::from_str(body).map_err(|e| {
            CarrierError::Auth(AuthFailure::new(
                AuthFailureReason::MalformedTokenResponse,
                format!("token response is not valid JSON: {}", e),
            ))
        })
    }

    fn require<'a, T>(field: &'static str, value: Option<&'a T>) -> Result<&'a T, CarrierError>
    where
        T: ?Sized,
    {
        value.ok_or_else(|| {
            CarrierError::Auth(AuthFailure::new(
                AuthFailureReason::MalformedTokenResponse,
                format!("token response is missing `{}`", field),
            ))
        })
    }

    fn required_access(&self) -> Result<(&str, &str, u64), CarrierError> {
        let access = Self::require("access_token", self.access_token.as_deref())?;
        let token_type = Self::require("token_type", self.token_type.as_deref())?;
        let expires_in = *Self::require("expires_in", self.expires_in.as_ref())?;
        if access.is_empty() {
            return Err(CarrierError::Auth(AuthFailure::new(
                AuthFailureReason::MalformedTokenResponse,
                "token response carries an empty `access_token`",
            )));
        }
        Ok((access, token_type, expires_in))
    }
}

/// Token issued by the client-credentials grant.
#[derive(Clone, Debug)]
pub struct ClientCredentialsToken {
    pub access_token: SecretString,
    pub token_type: String,
    pub issued_at: Instant,
    pub expires_in_seconds: u64,
}

impl ClientCredentialsToken {
    /// Build from a token response received at `issued_at`.
    pub fn from_response(response: &TokenResponse, issued_at: Instant) -> Result<Self, CarrierError> {
        let (access, token_type, expires_in) = response.required_access()?;
        Ok(Self {
            access_token: SecretString::new(access.to_string()),
            token_type: token_type.to_string(),
            issued_at,
            expires_in_seconds: expires_in,
        })
    }
}

/// Token issued by the authorization-code grant (or a refresh of one).
#[derive(Clone, Debug)]
pub struct AuthCodeToken {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub token_type: String,
    pub issued_at: Instant,
    pub expires_in_seconds: u64,
    pub refresh_issued_at: Instant,
    pub refresh_expires_in_seconds: u64,
}

impl AuthCodeToken {
    /// Build the first token of a session from a code-exchange response.
    pub fn from_response(response: &TokenResponse, issued_at: Instant) -> Result<Self, CarrierError> {
        let (access, token_type, expires_in) = response.required_access()?;
        let refresh = TokenResponse::require("refresh_token", response.refresh_token.as_deref())?;
        let refresh_expires_in = *TokenResponse::require(
            "refresh_token_expires_in",
            response.refresh_token_expires_in.as_ref(),
        )?;

        Ok(Self {
            access_token: SecretString::new(access.to_string()),
            refresh_token: SecretString::new(refresh.to_string()),
            token_type: token_type.to_string(),
            issued_at,
            expires_in_seconds: expires_in,
            refresh_issued_at: issued_at,
            refresh_expires_in_seconds: refresh_expires_in,
        })
    }

    /// Build the successor of `self` from a refresh response.
    ///
    /// A rotated refresh token restarts the refresh lifetime; otherwise the
    /// existing refresh token keeps its original expiry.
    pub fn refreshed(&self, response: &TokenResponse, issued_at: Instant) -> Result<Self, CarrierError> {
        let (access, token_type, expires_in) = response.required_access()?;

        let (refresh_token, refresh_issued_at, refresh_expires_in_seconds) =
            match response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
                Some(rotated) => {
                    let lifetime = *TokenResponse::require(
                        "refresh_token_expires_in",
                        response.refresh_token_expires_in.as_ref(),
                    )?;
                    (SecretString::new(rotated.to_string()), issued_at, lifetime)
                }
                None => (
                    self.refresh_token.clone(),
                    self.refresh_issued_at,
                    self.refresh_expires_in_seconds,
                ),
            };

        Ok(Self {
            access_token: SecretString::new(access.to_string()),
            refresh_token,
            token_type: token_type.to_string(),
            issued_at,
            expires_in_seconds: expires_in,
            refresh_issued_at,
            refresh_expires_in_seconds,
        })
    }

    /// Hard refresh-token expiry.
    pub fn refresh_expiry(&self) -> Instant {
        lifetime_end(self.refresh_issued_at, self.refresh_expires_in_seconds)
    }

    /// Whether the refresh token can still be exchanged.
    pub fn refresh_usable(&self, now: Instant, margin: Duration) -> bool {
        usable_until(self.refresh_expiry(), now, margin)
    }

    pub fn refresh_secret(&self) -> &str {
        self.refresh_token.expose_secret()
    }
}

/// A bearer credential held by a credential store.
#[derive(Clone, Debug)]
pub enum Credential {
    ClientCredentials(ClientCredentialsToken),
    AuthorizationCode(AuthCodeToken),
}

impl Credential {
    /// Access token value (for the Authorization header).
    pub fn access_token(&self) -> &str {
        match self {
            Self::ClientCredentials(t) => t.access_token.expose_secret(),
            Self::AuthorizationCode(t) => t.access_token.expose_secret(),
        }
    }

    pub fn token_type(&self) -> &str {
        match self {
            Self::ClientCredentials(t) => &t.token_type,
            Self::AuthorizationCode(t) => &t.token_type,
        }
    }

    pub fn issued_at(&self) -> Instant {
        match self {
            Self::ClientCredentials(t) => t.issued_at,
            Self::AuthorizationCode(t) => t.issued_at,
        }
    }

    fn expires_in_seconds(&self) -> u64 {
        match self {
            Self::ClientCredentials(t) => t.expires_in_seconds,
            Self::AuthorizationCode(t) => t.expires_in_seconds,
        }
    }

    /// Hard access-token expiry.
    pub fn expiry(&self) -> Instant {
        lifetime_end(self.issued_at(), self.expires_in_seconds())
    }

    /// Whether the access token may be presented at `now`.
    pub fn is_usable(&self, now: Instant, margin: Duration) -> bool {
        usable_until(self.expiry(), now, margin)
    }

    pub fn as_auth_code(&self) -> Option<&AuthCodeToken> {
        match self {
            Self::AuthorizationCode(t) => Some(t),
            Self::ClientCredentials(_) => None,
        }
    }

    /// Copy of this credential whose access token is already expired.
    ///
    /// Used after a 401: the access token is dead but a refresh token, if
    /// any, is still worth keeping.
    pub fn with_access_revoked(&self) -> Self {
        match self {
            Self::ClientCredentials(t) => Self::ClientCredentials(ClientCredentialsToken {
                expires_in_seconds: 0,
                ..t.clone()
            }),
            Self::AuthorizationCode(t) => Self::AuthorizationCode(AuthCodeToken {
                expires_in_seconds: 0,
                ..t.clone()
            }),
        }
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type(), self.access_token())
    }
}

/// Longest lifetime honoured for any token; larger `expires_in` values are clamped.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

// `start + seconds`, clamped so an absurd lifetime cannot overflow `Instant`.
fn lifetime_end(start: Instant, seconds: u64) -> Instant {
    let lifetime = Duration::from_secs(seconds).min(MAX_TOKEN_LIFETIME);
    start.checked_add(lifetime).unwrap_or(start)
}

// `now < expiry - margin`, without underflowing when the margin exceeds the lifetime.
fn usable_until(expiry: Instant, now: Instant, margin: Duration) -> bool {
    match expiry.checked_sub(margin) {
        Some(deadline) => now < deadline,
        None => false,
    }
}
