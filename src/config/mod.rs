//! Environment-driven configuration for the gateway.

mod config;
mod error;
mod logging;

pub use config::{AllowedOrigin, Environment, ServerConfig, DEFAULT_PORT};
pub use error::ConfigError;
pub use logging::init_logging;
