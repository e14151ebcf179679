use crate::error::{QuedError, Result};
use std::time::Duration;

/// Suffix appended to a queue name to derive its dead-letter list.
pub const DEAD_LETTER_SUFFIX: &str = ":dead";

#[derive(Debug, Clone)]
pub struct Config {
    /// Key of the live list.
    pub name: String,
    /// Store connection address.
    pub url: String,
    /// Attempts after which a retried message is dead-lettered.
    pub max_tries: u32,
    /// How long a [`Worker`](crate::Worker) blocks on each pop.
    pub poll_timeout: Duration,
    /// Consecutive store failures a worker tolerates before giving up.
    pub max_retries: u32,
    /// Base delay of the worker's exponential backoff.
    pub retry_delay: Duration,
}

impl Config {
    pub fn dead_letter_name(&self) -> String {
        format!("{}{}", self.name, DEAD_LETTER_SUFFIX)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(QuedError::Configuration(
                "Queue name must not be empty".to_string(),
            ));
        }
        if self.max_tries == 0 {
            return Err(QuedError::Configuration(
                "max_tries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            url: "redis://localhost:6379".to_string(),
            max_tries: 3,
            poll_timeout: Duration::from_secs(5),
            max_retries: 5,
            retry_delay: Duration::from_millis(100),
        }
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.config.max_tries = max_tries;
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    pub fn poll_timeout_ms(mut self, ms: u64) -> Self {
        self.config.poll_timeout = Duration::from_millis(ms);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay = Duration::from_millis(ms);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
