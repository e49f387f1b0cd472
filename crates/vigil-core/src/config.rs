use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry behaviour for store calls that hit transient errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts before giving up.
    /// Default: 250
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Base delay between attempts in milliseconds. Each sleep is jittered
    /// uniformly in [0.5, 1.5) of this value.
    /// Default: 10ms
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> usize {
    250
}

fn default_base_delay_ms() -> u64 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Polling behaviour of the change-log reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Fixed interval between change-log polls, in milliseconds.
    /// Default: 100ms
    // TODO: make the interval adaptive to observed change rates.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
