//! Builders
//!
//! Fluent builder for carrier client configuration.

pub mod config;

pub use config::{carrier_config, CarrierConfigBuilder};
