use thiserror::Error;

/// Configuration error type.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),

    #[error("invalid GATEWAY_ENV value: {0} (expected development or production)")]
    InvalidEnvironment(String),

    #[error("invalid ALLOWED_ORIGIN value: {0}")]
    InvalidAllowedOrigin(String),

    #[error("ALLOWED_ORIGIN must be set when GATEWAY_ENV=production")]
    MissingAllowedOrigin,
}
