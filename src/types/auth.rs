//! Authorization Types
//!
//! Types for the grants and the authorization-code redirect round trip.

/// Which grant a credential is obtained through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Grant {
    /// Machine-to-machine token for the configured account.
    ClientCredentials,
    /// User-delegated token for one external session.
    AuthorizationCode { session_key: String },
}

impl Grant {
    /// Grant for an authorization-code session.
    pub fn session(session_key: impl Into<String>) -> Self {
        Self::AuthorizationCode {
            session_key: session_key.into(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::AuthorizationCode { .. } => "authorization_code",
        }
    }
}

/// PKCE parameters (S256 only).
#[derive(Clone)]
pub struct PkceParams {
    /// Code verifier (keep secret).
    pub code_verifier: String,
    /// Code challenge (sent in authorization URL).
    pub code_challenge: String,
}

impl PkceParams {
    pub const CHALLENGE_METHOD: &'static str = "S256";
}

impl std::fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParams")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// Result of starting an authorization.
#[derive(Clone)]
pub struct AuthorizationRedirect {
    /// URL to send the user to.
    pub redirect_url: String,
    /// Verifier to hand back on completion.
    pub pending_verifier: String,
    /// Anti-forgery state echoed by the authorization server.
    pub state: String,
}

impl std::fmt::Debug for AuthorizationRedirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRedirect")
            .field("redirect_url", &self.redirect_url)
            .field("pending_verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}
