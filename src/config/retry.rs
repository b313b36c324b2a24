use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_RETRY_BASE_SLEEP_MS;
use crate::constants::DEFAULT_RETRY_MAX_RETRIES;
use crate::constants::DEFAULT_RETRY_MAX_SLEEP_MS;
use crate::constants::MAX_RETRIES_LIMIT;
use crate::ConfigurationError;
use crate::Result;

/// Exponential backoff settings for a session's transient faults
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RetryConfig {
    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_sleep_ms")]
    pub base_sleep_ms: u64,

    /// Attempts allowed after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound of a single sleep (unit: milliseconds)
    #[serde(default = "default_max_sleep_ms")]
    pub max_sleep_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_sleep_ms: default_base_sleep_ms(),
            max_retries: default_max_retries(),
            max_sleep_ms: default_max_sleep_ms(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_sleep_ms == 0 {
            return Err(ConfigurationError::Invalid("retry base_sleep_ms must be > 0".into()).into());
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigurationError::Invalid(format!(
                "retry max_retries must be <= {MAX_RETRIES_LIMIT}, got {}",
                self.max_retries
            ))
            .into());
        }
        if self.max_sleep_ms < self.base_sleep_ms {
            return Err(ConfigurationError::Invalid(format!(
                "retry max_sleep_ms ({}) must be >= base_sleep_ms ({})",
                self.max_sleep_ms, self.base_sleep_ms
            ))
            .into());
        }
        Ok(())
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::ExponentialBackoff {
            base_sleep: Duration::from_millis(self.base_sleep_ms),
            max_retries: self.max_retries.min(MAX_RETRIES_LIMIT),
            max_sleep: Duration::from_millis(self.max_sleep_ms),
        }
    }
}

/// Runtime retry policy handed to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Never retry
    Never,

    /// Sleep `base_sleep * rand(1..2^(n+1))` before retry `n`, capped at `max_sleep`
    ExponentialBackoff {
        base_sleep: Duration,
        max_retries: u32,
        max_sleep: Duration,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().policy()
    }
}

impl RetryPolicy {
    /// Whether attempt number `retry_count` (zero based) may run
    pub fn allow_retry(
        &self,
        retry_count: u32,
    ) -> bool {
        match self {
            RetryPolicy::Never => false,
            RetryPolicy::ExponentialBackoff { max_retries, .. } => retry_count < *max_retries,
        }
    }

    /// Sleep before attempt number `retry_count`
    pub fn sleep_for(
        &self,
        retry_count: u32,
    ) -> Duration {
        match self {
            RetryPolicy::Never => Duration::ZERO,
            RetryPolicy::ExponentialBackoff {
                base_sleep,
                max_sleep,
                ..
            } => {
                let shift = retry_count.min(MAX_RETRIES_LIMIT) + 1;
                let factor = rand::thread_rng().gen_range(0..(1u32 << shift)).max(1);
                base_sleep.saturating_mul(factor).min(*max_sleep)
            }
        }
    }
}

fn default_base_sleep_ms() -> u64 {
    DEFAULT_RETRY_BASE_SLEEP_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_RETRY_MAX_RETRIES
}

fn default_max_sleep_ms() -> u64 {
    DEFAULT_RETRY_MAX_SLEEP_MS
}
