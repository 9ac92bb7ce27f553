//! PKCE Generator
//!
//! RFC 7636 Proof Key for Code Exchange, S256 method.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

use crate::types::PkceParams;

/// PKCE generator interface (for dependency injection).
pub trait PkceGenerator: Send + Sync {
    /// Generate a verifier/challenge pair.
    fn generate(&self) -> PkceParams;
}

/// `BASE64URL(SHA256(verifier))`.
pub fn compute_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Default PKCE generator backed by the OS-seeded thread RNG.
pub struct DefaultPkceGenerator {
    verifier_length: usize,
}

impl DefaultPkceGenerator {
    /// Create new PKCE generator with default verifier length (64).
    pub fn new() -> Self {
        Self::with_length(64)
    }

    /// Create PKCE generator with custom verifier length.
    ///
    /// # Panics
    /// Panics if length is not between 43 and 128 (RFC 7636 requirement).
    pub fn with_length(length: usize) -> Self {
        assert!(
            (43..=128).contains(&length),
            "PKCE verifier length must be between 43 and 128"
        );
        Self {
            verifier_length: length,
        }
    }

    fn generate_verifier(&self) -> String {
        let mut bytes = vec![0u8; (self.verifier_length * 3 + 3) / 4];
        rand::thread_rng().fill_bytes(&mut bytes);
        let mut encoded = URL_SAFE_NO_PAD.encode(&bytes);
        encoded.truncate(self.verifier_length);
        encoded
    }
}

impl Default for DefaultPkceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceGenerator for DefaultPkceGenerator {
    fn generate(&self) -> PkceParams {
        let code_verifier = self.generate_verifier();
        let code_challenge = compute_challenge(&code_verifier);
        PkceParams {
            code_verifier,
            code_challenge,
        }
    }
}

/// Mock PKCE generator for testing.
#[derive(Default)]
pub struct MockPkceGenerator {
    next_verifiers: Mutex<VecDeque<String>>,
    generate_history: Mutex<Vec<PkceParams>>,
}

impl MockPkceGenerator {
    /// Create new mock PKCE generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next verifier to generate.
    pub fn set_next_verifier(&self, verifier: impl Into<String>) -> &Self {
        self.next_verifiers.lock().push_back(verifier.into());
        self
    }

    /// Get generate history.
    pub fn get_generate_history(&self) -> Vec<PkceParams> {
        self.generate_history.lock().clone()
    }
}

impl PkceGenerator for MockPkceGenerator {
    fn generate(&self) -> PkceParams {
        let code_verifier = self
            .next_verifiers
            .lock()
            .pop_front()
            .unwrap_or_else(|| format!("mock-verifier-{:032x}", rand::random::<u128>()));

        let params = PkceParams {
            code_challenge: compute_challenge(&code_verifier),
            code_verifier,
        };

        self.generate_history.lock().push(params.clone());
        params
    }
}

/// Validate PKCE verifier format.
pub fn is_valid_verifier(verifier: &str) -> bool {
    // RFC 7636: verifier must be 43-128 characters
    if !(43..=128).contains(&verifier.len()) {
        return false;
    }

    // Unreserved characters only: [A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"
    verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}
