//! OAuth2 Flows
//!
//! The two grants carrier APIs support:
//!
//! - **Client Credentials** (RFC 6749 Section 4.4): machine-to-machine tokens
//! - **Authorization Code with PKCE** (RFC 6749 Section 4.1, RFC 7636), with
//!   the refresh grant that extends a session

pub mod authorization_code;
pub mod client_credentials;
pub mod token_endpoint;

pub use authorization_code::{AuthorizationCodeFlow, AuthorizationCodeFlowImpl};
pub use client_credentials::{ClientCredentialsFlow, ClientCredentialsFlowImpl};
pub use token_endpoint::TokenEndpoint;
