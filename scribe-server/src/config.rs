//! Environment configuration for the server binary.
//!
//! | Variable                   | Default          |
//! |----------------------------|------------------|
//! | `SCRIBE_WS_ADDR`           | `127.0.0.1:9090` |
//! | `SCRIBE_HTTP_ADDR`         | `127.0.0.1:5000` |
//! | `SCRIBE_OUTBOUND_CAPACITY` | `256`            |
//! | `CORS_ORIGINS`             | `*`              |

use scribe_collab::ServerConfig;
use thiserror::Error;

pub const WS_ADDR_VAR: &str = "SCRIBE_WS_ADDR";
pub const HTTP_ADDR_VAR: &str = "SCRIBE_HTTP_ADDR";
pub const OUTBOUND_CAPACITY_VAR: &str = "SCRIBE_OUTBOUND_CAPACITY";
pub const CORS_ORIGINS_VAR: &str = "CORS_ORIGINS";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is set but empty")]
    Empty { var: &'static str },
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Build the config from the process environment.
pub fn from_env() -> Result<ServerConfig, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Build the config from any key lookup; unset keys keep their defaults.
pub fn from_lookup<F>(lookup: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ServerConfig::default();

    if let Some(addr) = lookup(WS_ADDR_VAR) {
        config.ws_bind_addr = non_empty(WS_ADDR_VAR, addr)?;
    }
    if let Some(addr) = lookup(HTTP_ADDR_VAR) {
        config.http_bind_addr = non_empty(HTTP_ADDR_VAR, addr)?;
    }
    if let Some(raw) = lookup(OUTBOUND_CAPACITY_VAR) {
        config.outbound_capacity = match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(ConfigError::InvalidNumber {
                    var: OUTBOUND_CAPACITY_VAR,
                    value: raw,
                })
            }
        };
    }
    if let Some(raw) = lookup(CORS_ORIGINS_VAR) {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if !origins.is_empty() {
            config.cors_origins = origins;
        }
    }

    Ok(config)
}

fn non_empty(var: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { var });
    }
    Ok(trimmed.to_string())
}
