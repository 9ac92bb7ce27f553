//! Pending Authorizations
//!
//! PKCE verifiers waiting for their authorization redirect, one per session.
//! Each entry is consumed at most once.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{AuthFailure, AuthFailureReason};
use crate::types::PkceParams;

/// Random anti-forgery `state` value (32 bytes, base64url).
pub fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

struct PendingAuthorization {
    code_verifier: String,
    state: String,
    created_at: Instant,
}

/// In-memory registry of started authorizations.
pub struct PendingAuthorizations {
    entries: Mutex<HashMap<String, PendingAuthorization>>,
    max_age: Duration,
}

impl PendingAuthorizations {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age,
        }
    }

    /// Register the verifier for `session_key`, replacing any earlier attempt.
    pub fn register(&self, session_key: &str, pkce: &PkceParams, state: &str, now: Instant) {
        self.entries.lock().insert(
            session_key.to_string(),
            PendingAuthorization {
                code_verifier: pkce.code_verifier.clone(),
                state: state.to_string(),
                created_at: now,
            },
        );
    }

    /// Take the pending entry for `session_key` if `verifier` matches it.
    ///
    /// When the redirect's `state` is given it must equal the issued one. The
    /// entry is removed on every call, matching or not.
    pub fn consume(
        &self,
        session_key: &str,
        verifier: &str,
        state: Option<&str>,
        now: Instant,
    ) -> Result<(), AuthFailure> {
        let entry = self.entries.lock().remove(session_key).ok_or_else(|| {
            AuthFailure::new(
                AuthFailureReason::VerifierRejected,
                "no pending authorization for session (never started or already completed)",
            )
        })?;

        if now.saturating_duration_since(entry.created_at) >= self.max_age {
            return Err(AuthFailure::new(
                AuthFailureReason::VerifierRejected,
                "pending authorization expired",
            ));
        }

        if entry.code_verifier != verifier {
            return Err(AuthFailure::new(
                AuthFailureReason::VerifierRejected,
                "verifier does not match the pending authorization",
            ));
        }

        if state.map_or(false, |returned| returned != entry.state) {
            return Err(AuthFailure::new(
                AuthFailureReason::VerifierRejected,
                "state does not match the pending authorization",
            ));
        }

        Ok(())
    }

    pub fn is_pending(&self, session_key: &str) -> bool {
        self.entries.lock().contains_key(session_key)
    }

    /// Drop the pending entry for `session_key`.
    pub fn discard(&self, session_key: &str) -> bool {
        self.entries.lock().remove(session_key).is_some()
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn clear_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.created_at) < self.max_age);
        before - entries.len()
    }
}
