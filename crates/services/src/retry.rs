use std::time::Duration;

/// Backoff policy for retrying a fallible async operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }
}

fn jitter(max: Option<Duration>) -> Duration {
    let Some(max) = max else {
        return Duration::ZERO;
    };
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::random::<u64>() % (max_ms + 1))
}

/// Run `f` until it succeeds, `should_retry` rejects the error, or attempts run out.
///
/// Sleeps with exponential backoff (capped at `max_backoff`) plus optional jitter
/// between attempts. The last error is returned unchanged.
pub async fn retry_while<F, Fut, T, E, P>(config: RetryConfig, mut f: F, should_retry: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempts_left = config.max_attempts.max(1);
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 || !should_retry(&e) {
                    return Err(e);
                }

                tokio::time::sleep(backoff + jitter(config.jitter_max)).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}
