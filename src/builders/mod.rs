//! Builders
//!
//! Fluent builder patterns for configuration and the session manager.

pub mod config;
pub mod manager;

pub use config::{http_renewal_config, session_config, HttpRenewalConfigBuilder, SessionConfigBuilder};
pub use manager::SessionManagerBuilder;
