// src/utils/retry.rs

use std::{future::Future, time::Duration};

use rand::Rng;

use crate::{config::RetryPolicy, error::AppError};

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Runs `op`, retrying transient store failures with exponential backoff and jitter.
///
/// Only `AppError::Unavailable` is retried. Everything else, including
/// `NotFound` and `InvalidSession`, is returned on the first occurrence.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = backoff(policy.base_delay, attempt);
                tracing::warn!(
                    "{} failed transiently, retrying in {:?} (attempt {}/{}): {}",
                    label,
                    delay,
                    attempt,
                    policy.max_retries,
                    e
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

/// `base * 2^(attempt-1)` capped at `MAX_BACKOFF`, plus up to half of that again as jitter.
fn backoff(base: Duration, attempt: u32) -> Duration {
    let exp = base
        .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
        .min(MAX_BACKOFF);
    let jitter_cap = exp.as_millis() as u64 / 2;
    let jitter = if jitter_cap == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_cap)
    };
    exp + Duration::from_millis(jitter)
}
