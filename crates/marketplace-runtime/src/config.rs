//! Runtime configuration from environment variables.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `MARKET_TOKEN_SECRET` | none, required | HMAC key for access tokens |
//! | `MARKET_CHANNEL_CAPACITY` | 1024 | Event bus channel capacity |
//! | `MARKET_OUTBOX_PUMP_MS` | 25 | Outbox flush interval |

use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use std::time::Duration;
use thiserror::Error;

/// Shortest token secret accepted.
const MIN_SECRET_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MARKET_TOKEN_SECRET is not set; refusing to run with an unsigned token scheme")]
    MissingTokenSecret,

    #[error("MARKET_TOKEN_SECRET must be at least {MIN_SECRET_BYTES} bytes")]
    WeakTokenSecret,

    #[error("invalid value for {variable}: {value}")]
    InvalidValue { variable: String, value: String },
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// HMAC key signing and verifying access tokens.
    pub token_secret: Vec<u8>,
    /// Event bus channel capacity.
    pub channel_capacity: usize,
    /// How often service outboxes are flushed to the bus.
    pub outbox_pump_interval: Duration,
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token_secret = std::env::var("MARKET_TOKEN_SECRET")
            .map_err(|_| ConfigError::MissingTokenSecret)?
            .into_bytes();
        if token_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakTokenSecret);
        }
        Ok(Self {
            token_secret,
            channel_capacity: parse_env("MARKET_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY)?,
            outbox_pump_interval: Duration::from_millis(parse_env("MARKET_OUTBOX_PUMP_MS", 25)?),
        })
    }

    /// A configuration for tests and local experiments.
    #[must_use]
    pub fn for_testing(secret: &[u8]) -> Self {
        Self {
            token_secret: secret.to_vec(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            outbox_pump_interval: Duration::from_millis(5),
        }
    }
}

fn parse_env<T: std::str::FromStr>(variable: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(variable) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            variable: variable.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
