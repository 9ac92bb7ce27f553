//! Carrier Core Components
//!
//! Time, transport, PKCE and pending-authorization infrastructure.

pub mod clock;
pub mod pending;
pub mod pkce;
pub mod transport;

pub use clock::*;
pub use pending::*;
pub use pkce::*;
pub use transport::*;
