//! Carrier Error Types
//!
//! Error hierarchy shared by the credential, executor and pagination layers.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Root error type for carrier authentication and request execution.
///
/// Every variant is `Clone` so one single-flight token fetch can hand the
/// same outcome to every waiter.
#[derive(Error, Debug, Clone)]
pub enum CarrierError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthFailure),

    #[error("Request rejected: {0}")]
    Client(#[from] ClientFailure),

    #[error("Retry budget exhausted after {attempts} attempts (last status: {status:?})")]
    RetryExhausted {
        status: Option<u16>,
        body: Option<String>,
        attempts: u32,
        correlation_id: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Upstream returned HTTP {status}")]
    Upstream {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl CarrierError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CARRIER_CONFIG",
            Self::Auth(_) => "CARRIER_AUTH",
            Self::Client(_) => "CARRIER_CLIENT",
            Self::RetryExhausted { .. } => "CARRIER_RETRY_EXHAUSTED",
            Self::Transport(_) => "CARRIER_TRANSPORT",
            Self::Upstream { .. } => "CARRIER_UPSTREAM",
            Self::Protocol(_) => "CARRIER_PROTOCOL",
        }
    }

    /// Check if the error may clear up on its own and the call can be repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Upstream { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if the caller has to send the user through authorization again.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::Auth(failure) => matches!(
                failure.reason,
                AuthFailureReason::ReauthRequired
                    | AuthFailureReason::InvalidGrant
                    | AuthFailureReason::UnknownSession
            ),
            _ => false,
        }
    }

    /// Server-requested delay, when one was observed.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Upstream { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client(failure) => Some(failure.status),
            Self::RetryExhausted { status, .. } => *status,
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Correlation id of the logical call that failed, if it got that far.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Client(failure) => Some(&failure.correlation_id),
            Self::RetryExhausted { correlation_id, .. } => Some(correlation_id),
            _ => None,
        }
    }

    pub(crate) fn reauth_required(message: impl Into<String>) -> Self {
        Self::Auth(AuthFailure::new(AuthFailureReason::ReauthRequired, message))
    }
}

/// Why a credential could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureReason {
    /// Refresh token missing or expired; the user must authorize again.
    ReauthRequired,
    /// The token endpoint rejected the client id/secret.
    InvalidClient,
    /// The authorization code or refresh token was rejected.
    InvalidGrant,
    /// No credential has ever been stored for the session.
    UnknownSession,
    /// PKCE verifier missing, consumed, expired or not the one issued.
    VerifierRejected,
    /// The token endpoint answered 2xx with an unusable body.
    MalformedTokenResponse,
    /// Any other terminal rejection from the token endpoint.
    Rejected,
}

impl AuthFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReauthRequired => "REAUTH_REQUIRED",
            Self::InvalidClient => "INVALID_CLIENT",
            Self::InvalidGrant => "INVALID_GRANT",
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::VerifierRejected => "VERIFIER_REJECTED",
            Self::MalformedTokenResponse => "MALFORMED_TOKEN_RESPONSE",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-recoverable OAuth failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}: {message}")]
pub struct AuthFailure {
    pub reason: AuthFailureReason,
    pub message: String,
}

impl AuthFailure {
    pub fn new(reason: AuthFailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Caller-side request defect reported by the downstream API.
#[derive(Error, Debug, Clone)]
#[error("HTTP {status} (correlation id {correlation_id}){}", summarize(.errors))]
pub struct ClientFailure {
    pub status: u16,
    pub errors: Vec<DownstreamError>,
    pub correlation_id: String,
    pub body: String,
}

fn summarize(errors: &[DownstreamError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let joined = errors
        .iter()
        .map(|e| format!("{} {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    format!(": {}", joined)
}

/// One error entry from a downstream error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownstreamError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Configuration error.
#[derive(Error, Debug, Clone)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Network/transport error.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Transport failure: {message}")]
    Other { message: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

/// Result type for carrier operations.
pub type CarrierResult<T> = Result<T, CarrierError>;

/// Statuses worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// OAuth error response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    response: ErrorList,
}

#[derive(Deserialize)]
struct ErrorList {
    #[serde(default)]
    errors: Vec<DownstreamError>,
}

/// Parse downstream error entries from a response body.
///
/// Understands the carrier envelope `{"response":{"errors":[...]}}` and the
/// plain OAuth `{"error": ..., "error_description": ...}` shape.
pub fn parse_downstream_errors(body: &str) -> Vec<DownstreamError> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.response.errors;
    }
    if let Ok(oauth) = serde_json::from_str::<OAuthErrorResponse>(body) {
        return vec![DownstreamError {
            code: oauth.error,
            message: oauth.error_description.unwrap_or_default(),
        }];
    }
    Vec::new()
}

/// Map a non-2xx token endpoint response to an error.
///
/// Transient statuses become [`CarrierError::Upstream`] so the executor can
/// retry them; everything else is a terminal [`AuthFailure`].
pub fn map_token_endpoint_error(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> CarrierError {
    if is_retryable_status(status) {
        return CarrierError::Upstream {
            status,
            body: body.to_string(),
            retry_after,
        };
    }

    let oauth = serde_json::from_str::<OAuthErrorResponse>(body).ok();
    let reason = match oauth.as_ref().map(|r| r.error.as_str()) {
        Some("invalid_client") => AuthFailureReason::InvalidClient,
        Some("invalid_grant") => AuthFailureReason::InvalidGrant,
        _ if status == 401 => AuthFailureReason::InvalidClient,
        _ => AuthFailureReason::Rejected,
    };

    let message = match oauth {
        Some(r) => r.error_description.unwrap_or(r.error),
        None => {
            let detail = parse_downstream_errors(body)
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            if detail.is_empty() {
                format!("token endpoint returned HTTP {}", status)
            } else {
                detail
            }
        }
    };

    CarrierError::Auth(AuthFailure::new(reason, message))
}
