//! Credential Store
//!
//! Holds the current credential of one account or session and swaps it by
//! identity.

use parking_lot::Mutex;
use std::sync::Arc;

use super::SingleFlight;
use crate::types::Credential;

/// Current credential of one holder.
///
/// Writers compare the `Arc` they observed with the one installed and only
/// replace it when both are the same allocation, so of two racing refreshes
/// exactly one lands. The lock is never held across an await.
#[derive(Default)]
pub struct CredentialStore {
    current: Mutex<Option<Arc<Credential>>>,
    flight: Arc<SingleFlight>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with a credential.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            current: Mutex::new(Some(Arc::new(credential))),
            flight: Arc::new(SingleFlight::new()),
        }
    }

    pub fn read(&self) -> Option<Arc<Credential>> {
        self.current.lock().clone()
    }

    /// Compare-and-swap on identity.
    ///
    /// Installs `new` only if the stored value is still `expected`
    /// (`None` meaning empty). Returns whether the swap happened.
    pub fn replace(&self, expected: Option<&Arc<Credential>>, new: Option<Arc<Credential>>) -> bool {
        let mut current = self.current.lock();
        let unchanged = match (current.as_ref(), expected) {
            (Some(held), Some(seen)) => Arc::ptr_eq(held, seen),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            *current = new;
        }
        unchanged
    }

    /// Install a freshly fetched credential over `expected`.
    ///
    /// When another writer got there first the fetched credential is dropped
    /// and the winner's is returned instead.
    pub fn install(&self, expected: Option<&Arc<Credential>>, fetched: Arc<Credential>) -> Arc<Credential> {
        if self.replace(expected, Some(fetched.clone())) {
            return fetched;
        }
        tracing::debug!("lost credential install race, using the winner");
        self.read().unwrap_or(fetched)
    }

    /// Drop whatever is stored.
    pub fn invalidate(&self) {
        *self.current.lock() = None;
    }

    /// Mark the access token of `observed` dead, keeping any refresh token.
    ///
    /// A no-op if `observed` has already been replaced.
    pub fn invalidate_observed(&self, observed: &Arc<Credential>) -> bool {
        self.replace(Some(observed), Some(Arc::new(observed.with_access_revoked())))
    }

    pub(crate) fn flight(&self) -> &Arc<SingleFlight> {
        &self.flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientCredentialsToken, TokenResponse, SAFETY_MARGIN};
    use std::time::Instant;

    fn credential(token: &str) -> Credential {
        let response = TokenResponse::from_body(&format!(
            r#"{{"access_token":"{}","token_type":"Bearer","expires_in":3600}}"#,
            token
        ))
        .unwrap();
        Credential::ClientCredentials(ClientCredentialsToken::from_response(&response, Instant::now()).unwrap())
    }

    #[test]
    fn test_replace_compares_identity_not_value() {
        let store = CredentialStore::with_credential(credential("a"));
        let seen = store.read().unwrap();
        let lookalike = Arc::new(credential("a"));

        assert!(!store.replace(Some(&lookalike), Some(Arc::new(credential("b")))));
        assert_eq!(store.read().unwrap().access_token(), "a");

        assert!(store.replace(Some(&seen), Some(Arc::new(credential("b")))));
        assert_eq!(store.read().unwrap().access_token(), "b");
    }

    #[test]
    fn test_exactly_one_racing_writer_wins() {
        let store = CredentialStore::new();
        let first = store.install(None, Arc::new(credential("first")));
        let second = store.install(None, Arc::new(credential("second")));

        assert_eq!(first.access_token(), "first");
        assert_eq!(second.access_token(), "first");
    }

    #[test]
    fn test_invalidate_observed() {
        let store = CredentialStore::with_credential(credential("a"));
        let seen = store.read().unwrap();

        assert!(store.invalidate_observed(&seen));
        assert!(!store.read().unwrap().is_usable(Instant::now(), SAFETY_MARGIN));
        assert!(!store.invalidate_observed(&seen));

        store.invalidate();
        assert!(store.read().is_none());
    }
}
