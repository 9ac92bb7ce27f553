//! Carrier Types
//!
//! Credentials, request context and configuration types.

pub mod auth;
pub mod config;
pub mod context;
pub mod token;

pub use auth::*;
pub use config::*;
pub use context::*;
pub use token::*;
