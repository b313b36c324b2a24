use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::RetryConfig;
use crate::constants::DEFAULT_CONNECTION_TIMEOUT_MS;
use crate::constants::DEFAULT_SESSION_TIMEOUT_MS;
use crate::ConfigurationError;
use crate::Result;

/// Parameters applied to every session the registry creates
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    /// Server-side session expiry
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Bound on establishing the initial connection
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: default_session_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.session_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid("session_timeout_ms must be > 0".into()).into());
        }
        if self.connection_timeout_ms == 0 {
            return Err(
                ConfigurationError::Invalid("connection_timeout_ms must be > 0".into()).into(),
            );
        }
        self.retry.validate()
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}
