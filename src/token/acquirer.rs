//! Token Acquirer
//!
//! Serves usable credentials from the stores and fetches new ones through the
//! client-credentials and authorization-code grants.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::{CredentialStore, FetchResult, TokenRevoker, TokenTypeHint};
use crate::core::{generate_state, is_valid_verifier, Clock, PendingAuthorizations, PkceGenerator};
use crate::error::{AuthFailure, AuthFailureReason, CarrierError, ConfigurationError};
use crate::flows::{AuthorizationCodeFlow, ClientCredentialsFlow};
use crate::types::{
    AuthCodeToken, AuthorizationRedirect, CarrierConfig, ClientCredentialsToken, Credential, Grant, SAFETY_MARGIN,
};

/// Diagnostic snapshot of a stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub grant_type: &'static str,
    /// Whether the access token can be presented right now.
    pub usable: bool,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub refresh_usable: Option<bool>,
}

/// Collaborators the acquirer is built from.
pub struct AcquirerParts {
    pub config: Arc<CarrierConfig>,
    pub clock: Arc<dyn Clock>,
    pub client_credentials: Arc<dyn ClientCredentialsFlow>,
    pub authorization_code: Arc<dyn AuthorizationCodeFlow>,
    pub pkce: Arc<dyn PkceGenerator>,
    pub revoker: Arc<dyn TokenRevoker>,
}

/// Obtains bearer credentials, one store per account or session.
pub struct TokenAcquirer {
    config: Arc<CarrierConfig>,
    clock: Arc<dyn Clock>,
    client_credentials: Arc<dyn ClientCredentialsFlow>,
    authorization_code: Arc<dyn AuthorizationCodeFlow>,
    pkce: Arc<dyn PkceGenerator>,
    revoker: Arc<dyn TokenRevoker>,
    account: Arc<CredentialStore>,
    sessions: RwLock<HashMap<String, Arc<CredentialStore>>>,
    pending: PendingAuthorizations,
}

impl TokenAcquirer {
    pub fn new(parts: AcquirerParts) -> Self {
        let pending = PendingAuthorizations::new(parts.config.pending_authorization_ttl);
        Self {
            config: parts.config,
            clock: parts.clock,
            client_credentials: parts.client_credentials,
            authorization_code: parts.authorization_code,
            pkce: parts.pkce,
            revoker: parts.revoker,
            account: Arc::new(CredentialStore::new()),
            sessions: RwLock::new(HashMap::new()),
            pending,
        }
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    /// Access token for `grant`.
    pub async fn acquire(&self, grant: &Grant) -> Result<String, CarrierError> {
        Ok(self.acquire_credential(grant).await?.access_token().to_string())
    }

    /// A usable credential for `grant`, fetching one if needed.
    ///
    /// Concurrent callers for the same store share one token request.
    #[instrument(skip(self), fields(grant = grant.as_str()))]
    pub async fn acquire_credential(&self, grant: &Grant) -> Result<Arc<Credential>, CarrierError> {
        let store = self.store_for(grant)?;
        let now = self.clock.now();

        let current = store.read();
        if let Some(credential) = current.as_ref().filter(|c| c.is_usable(now, SAFETY_MARGIN)) {
            tracing::trace!("serving cached credential");
            return Ok(credential.clone());
        }

        match grant {
            Grant::ClientCredentials => {
                let fetch = fetch_client_credentials(
                    store.clone(),
                    self.clock.clone(),
                    self.client_credentials.clone(),
                );
                store.flight().run(fetch).await
            }
            Grant::AuthorizationCode { session_key } => {
                let refreshed = match current {
                    None => Err(CarrierError::reauth_required("session has no credential; authorize again")),
                    Some(current) => match check_refresh_usable(&store, &current, now) {
                        Err(e) => Err(e),
                        Ok(()) => {
                            let fetch = refresh_session(
                                store.clone(),
                                self.clock.clone(),
                                self.authorization_code.clone(),
                            );
                            store.flight().run(fetch).await
                        }
                    },
                };
                if matches!(&refreshed, Err(e) if e.needs_reauth()) {
                    self.forget_session(session_key, &store);
                }
                refreshed
            }
        }
    }

    /// Mark `observed` dead after the downstream API rejected it.
    ///
    /// Only the first caller to report a given credential has an effect.
    pub fn invalidate(&self, grant: &Grant, observed: &Arc<Credential>) -> bool {
        match self.store_for(grant) {
            Ok(store) => store.invalidate_observed(observed),
            Err(_) => false,
        }
    }

    /// Start an authorization-code round trip for `session_key`.
    #[instrument(skip(self))]
    pub fn begin_authorization(
        &self,
        session_key: &str,
        scope: Option<&str>,
    ) -> Result<AuthorizationRedirect, CarrierError> {
        let pkce = self.pkce.generate();
        if !is_valid_verifier(&pkce.code_verifier) {
            return Err(CarrierError::Configuration(ConfigurationError::InvalidConfig {
                message: "PKCE generator produced a verifier outside RFC 7636 (43-128 unreserved chars)".to_string(),
            }));
        }
        let state = generate_state();
        let redirect_url = self
            .authorization_code
            .build_authorization_url(&pkce, &state, scope)?;

        let now = self.clock.now();
        self.pending.clear_expired(now);
        self.pending.register(session_key, &pkce, &state, now);

        tracing::info!("authorization started");
        Ok(AuthorizationRedirect {
            redirect_url,
            pending_verifier: pkce.code_verifier,
            state,
        })
    }

    /// Exchange the code returned to the redirect URI for the session's first
    /// credential.
    pub async fn complete_authorization(
        &self,
        session_key: &str,
        code: &str,
        pending_verifier: &str,
    ) -> Result<AuthCodeToken, CarrierError> {
        self.complete(session_key, code, pending_verifier, None).await
    }

    /// Like [`TokenAcquirer::complete_authorization`], also checking the
    /// `state` the redirect came back with against the one issued.
    pub async fn complete_authorization_with_state(
        &self,
        session_key: &str,
        code: &str,
        pending_verifier: &str,
        state: &str,
    ) -> Result<AuthCodeToken, CarrierError> {
        self.complete(session_key, code, pending_verifier, Some(state)).await
    }

    #[instrument(skip(self, code, pending_verifier, state))]
    async fn complete(
        &self,
        session_key: &str,
        code: &str,
        pending_verifier: &str,
        state: Option<&str>,
    ) -> Result<AuthCodeToken, CarrierError> {
        self.pending
            .consume(session_key, pending_verifier, state, self.clock.now())
            .map_err(|failure| {
                tracing::warn!(reason = %failure.reason, "verifier rejected");
                CarrierError::Auth(failure)
            })?;

        let started = self.clock.now();
        let response = self
            .authorization_code
            .exchange_code(code, pending_verifier)
            .await?;
        let token = AuthCodeToken::from_response(&response, started)?;

        // Installed under the map lock so a concurrent `forget_session` cannot
        // drop the entry between lookup and install.
        let credential = Arc::new(Credential::AuthorizationCode(token.clone()));
        let mut sessions = self.sessions.write();
        let store = sessions
            .entry(session_key.to_string())
            .or_insert_with(|| Arc::new(CredentialStore::new()));
        loop {
            let seen = store.read();
            if store.replace(seen.as_ref(), Some(credential.clone())) {
                break;
            }
        }
        drop(sessions);

        tracing::info!("authorization completed");
        Ok(token)
    }

    /// Forget everything held for `session_key`.
    ///
    /// With a revocation endpoint configured the refresh token is also revoked
    /// server-side; failures there are logged, not returned.
    #[instrument(skip(self))]
    pub async fn revoke(&self, session_key: &str) {
        self.pending.discard(session_key);
        let removed = self.sessions.write().remove(session_key);

        let Some(store) = removed else {
            tracing::debug!("no session to revoke");
            return;
        };
        let credential = store.read();
        store.invalidate();

        if self.config.provider.revocation_endpoint.is_none() {
            return;
        }
        if let Some(token) = credential.as_ref().and_then(|c| c.as_auth_code()) {
            if let Err(e) = self
                .revoker
                .revoke(token.refresh_secret(), TokenTypeHint::RefreshToken)
                .await
            {
                tracing::warn!(error = %e, "refresh token revocation failed");
            }
        }
    }

    /// Wall-clock expiry details for the credential held for `grant`.
    pub fn credential_status(&self, grant: &Grant) -> Option<CredentialStatus> {
        let credential = self.store_for(grant).ok()?.read()?;
        let now = self.clock.now();
        let wall_now = Utc::now();
        let auth = credential.as_auth_code();

        Some(CredentialStatus {
            grant_type: grant.as_str(),
            usable: credential.is_usable(now, SAFETY_MARGIN),
            access_expires_at: wall_clock(credential.expiry(), now, wall_now),
            refresh_expires_at: auth.map(|t| wall_clock(t.refresh_expiry(), now, wall_now)),
            refresh_usable: auth.map(|t| t.refresh_usable(now, SAFETY_MARGIN)),
        })
    }

    /// Whether `session_key` has a stored credential.
    pub fn has_session(&self, session_key: &str) -> bool {
        self.sessions.read().contains_key(session_key)
    }

    // Drop the map entry of a session whose credential was discarded, unless
    // it has since been replaced or re-authorized.
    fn forget_session(&self, session_key: &str, store: &Arc<CredentialStore>) {
        let mut sessions = self.sessions.write();
        let stale = sessions
            .get(session_key)
            .map_or(false, |held| Arc::ptr_eq(held, store) && held.read().is_none());
        if stale {
            sessions.remove(session_key);
            tracing::debug!("session forgotten, authorization required");
        }
    }

    fn store_for(&self, grant: &Grant) -> Result<Arc<CredentialStore>, CarrierError> {
        match grant {
            Grant::ClientCredentials => Ok(self.account.clone()),
            Grant::AuthorizationCode { session_key } => {
                self.sessions.read().get(session_key).cloned().ok_or_else(|| {
                    CarrierError::Auth(AuthFailure::new(
                        AuthFailureReason::UnknownSession,
                        format!("no credential stored for session `{}`", session_key),
                    ))
                })
            }
        }
    }
}

// Refresh expiry is checked before any request; a dead refresh token is discarded.
fn check_refresh_usable(
    store: &CredentialStore,
    current: &Arc<Credential>,
    now: Instant,
) -> Result<(), CarrierError> {
    let usable = current
        .as_auth_code()
        .map_or(false, |t| t.refresh_usable(now, SAFETY_MARGIN));
    if usable {
        return Ok(());
    }
    store.replace(Some(current), None);
    tracing::info!("refresh token expired, session needs authorization");
    Err(CarrierError::reauth_required("refresh token expired"))
}

async fn fetch_client_credentials(
    store: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    flow: Arc<dyn ClientCredentialsFlow>,
) -> FetchResult {
    let observed = store.read();
    if let Some(credential) = observed.as_ref().filter(|c| c.is_usable(clock.now(), SAFETY_MARGIN)) {
        return Ok(credential.clone());
    }

    let started = clock.now();
    let response = flow.request_token().await?;
    let token = ClientCredentialsToken::from_response(&response, started)?;
    tracing::debug!(expires_in = token.expires_in_seconds, "client credentials token issued");

    Ok(store.install(observed.as_ref(), Arc::new(Credential::ClientCredentials(token))))
}

async fn refresh_session(
    store: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    flow: Arc<dyn AuthorizationCodeFlow>,
) -> FetchResult {
    let current = store
        .read()
        .ok_or_else(|| CarrierError::reauth_required("session was revoked"))?;
    let now = clock.now();
    if current.is_usable(now, SAFETY_MARGIN) {
        return Ok(current);
    }
    check_refresh_usable(&store, &current, now)?;

    let previous = match current.as_auth_code() {
        Some(token) => token,
        None => return Err(CarrierError::reauth_required("session holds no refresh token")),
    };

    let started = clock.now();
    let response = match flow.refresh(previous.refresh_secret()).await {
        Ok(response) => response,
        Err(e) => {
            if e.needs_reauth() {
                store.replace(Some(&current), None);
            }
            return Err(e);
        }
    };

    let next = previous.refreshed(&response, started)?;
    tracing::debug!(
        expires_in = next.expires_in_seconds,
        rotated = next.refresh_issued_at == started,
        "session refreshed"
    );

    Ok(store.install(Some(&current), Arc::new(Credential::AuthorizationCode(next))))
}

fn wall_clock(at: Instant, now: Instant, wall_now: DateTime<Utc>) -> DateTime<Utc> {
    let offset = |d: std::time::Duration| chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero());
    if at >= now {
        wall_now + offset(at - now)
    } else {
        wall_now - offset(now - at)
    }
}
