//! Token Management
//!
//! Credential storage, acquisition and revocation.
//!
//! - **Credential Store**: identity compare-and-swap holder, one per account or session
//! - **Single Flight**: one token request per store no matter how many callers wait
//! - **Token Acquirer**: both grants, refresh, PKCE round trip
//! - **Token Revocation**: RFC 7009 token revocation

pub mod acquirer;
pub mod revocation;
pub mod single_flight;
pub mod store;

pub use acquirer::{AcquirerParts, CredentialStatus, TokenAcquirer};
pub use revocation::{DefaultTokenRevoker, TokenRevoker, TokenTypeHint};
pub use single_flight::{FetchResult, SharedFetch, SingleFlight};
pub use store::CredentialStore;
