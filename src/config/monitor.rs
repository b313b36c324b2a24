use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MONITOR_ENQUEUE_TIMEOUT_MS;
use crate::constants::DEFAULT_MONITOR_QUEUE_CAPACITY;
use crate::constants::DEFAULT_MONITOR_THREAD_NAME;
use crate::ConfigurationError;
use crate::Result;

/// Action hook worker settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Bounded dispatch queue size
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Longest a caller waits for a free queue slot before the record is dropped
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,

    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            thread_name: default_thread_name(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(ConfigurationError::Invalid("monitor queue_capacity must be > 0".into()).into());
        }
        if self.enqueue_timeout_ms == 0 {
            return Err(
                ConfigurationError::Invalid("monitor enqueue_timeout_ms must be > 0".into()).into(),
            );
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigurationError::Invalid("monitor thread_name can't be blank".into()).into());
        }
        Ok(())
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_MONITOR_QUEUE_CAPACITY
}

fn default_enqueue_timeout_ms() -> u64 {
    DEFAULT_MONITOR_ENQUEUE_TIMEOUT_MS
}

fn default_thread_name() -> String {
    DEFAULT_MONITOR_THREAD_NAME.to_string()
}
