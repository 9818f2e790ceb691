use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Retry policy for RPC calls against the node.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum total attempts; `None` retries forever.
    pub max_retries: Option<u32>,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Double the delay after each failed attempt (capped at 60s).
    pub exponential_backoff: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Some(3),
            base_delay: Duration::from_secs(2),
            exponential_backoff: true,
        }
    }
}

/// Run `operation` until it succeeds or the attempt budget is exhausted.
/// The last error is returned unchanged.
pub async fn retry_async<F, Fut, T, E>(mut operation: F, config: RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    let mut delay = config.base_delay;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if config.max_retries.is_some_and(|max| attempt >= max) {
            error!("🚫 Giving up after {} attempts: {}", attempt, err);
            return Err(err);
        }

        warn!(
            "⏳ Attempt {} failed: {}, retrying in {:?}",
            attempt, err, delay
        );
        tokio::time::sleep(delay).await;

        if config.exponential_backoff {
            delay = (delay * 2).min(Duration::from_secs(60));
        }
    }
}
