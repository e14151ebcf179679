use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::QuedError;

/// Exponential backoff for store calls that failed with a retryable error.
pub struct RetryStrategy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryStrategy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, QuedError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, QuedError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.calculate_delay(attempt);
                    warn!(
                        error = %err,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "store call failed, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(multiplier)
    }
}
