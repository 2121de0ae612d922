use std::str::FromStr;

use axum::http::HeaderValue;

use crate::config::ConfigError;

pub const DEFAULT_PORT: u16 = 3001;

/// Deployment mode; controls the default cross-origin policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Origin policy for cross-origin channel setup.
#[derive(Debug, Clone)]
pub enum AllowedOrigin {
    Any,
    Exact(HeaderValue),
}

/// Gateway configuration, read from the process environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: Environment,
    pub allowed_origin: AllowedOrigin,
}

impl ServerConfig {
    /// Read configuration from `PORT`, `GATEWAY_ENV` and `ALLOWED_ORIGIN`.
    ///
    /// Development defaults to allowing any origin; production requires an
    /// explicit `ALLOWED_ORIGIN`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(v) if v.trim().is_empty() => DEFAULT_PORT,
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidPort(v))?,
            Err(_) => DEFAULT_PORT,
        };

        let environment = match std::env::var("GATEWAY_ENV") {
            Ok(v) => v.parse()?,
            Err(_) => Environment::Development,
        };

        let allowed_origin = match std::env::var("ALLOWED_ORIGIN") {
            Ok(origin) => AllowedOrigin::Exact(
                origin
                    .parse::<HeaderValue>()
                    .map_err(|_| ConfigError::InvalidAllowedOrigin(origin))?,
            ),
            Err(_) => match environment {
                Environment::Development => AllowedOrigin::Any,
                Environment::Production => return Err(ConfigError::MissingAllowedOrigin),
            },
        };

        Ok(Self {
            port,
            environment,
            allowed_origin,
        })
    }

    /// Permissive development configuration on an OS-assigned port; used by
    /// tests.
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            environment: Environment::Development,
            allowed_origin: AllowedOrigin::Any,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }
}
