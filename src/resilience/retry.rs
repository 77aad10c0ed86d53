//! Jittered exponential backoff (C2). Hand-rolled rather than pulling in a
//! dedicated backoff crate — the policy is small enough to own directly.

use std::time::Duration;

use rand::Rng;

/// Retry timing policy (spec.md §9: webhook delivery uses maxRetries=3,
/// initialDelay=100ms, maxDelay=5s, multiplier=2, jitter=±10%; database
/// writes use a shorter profile — see `RetryProfile::DATABASE`).
#[derive(Debug, Clone, Copy)]
pub struct RetryProfile {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl RetryProfile {
    pub const WEBHOOK: RetryProfile = RetryProfile {
        max_retries: 3,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(5),
        multiplier: 2.0,
        jitter: 0.1,
    };

    pub const DATABASE: RetryProfile = RetryProfile {
        max_retries: 2,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_secs(2),
        multiplier: 2.0,
        jitter: 0.1,
    };

    /// The delay before retry attempt `attempt` (0-indexed), with ±jitter
    /// applied uniformly around the exponential backoff value.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter_span = capped * self.jitter;
        let jittered = rand::thread_rng().gen_range((capped - jitter_span)..=(capped + jitter_span));
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Retries `f` up to `profile.max_retries` additional times after the first
/// attempt, sleeping the jittered backoff delay between attempts. Returns
/// the last error if every attempt fails.
pub async fn retry_async<T, E, F, Fut>(profile: RetryProfile, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= profile.max_retries {
                    return Err(err);
                }
                tokio::time::sleep(profile.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_never_exceeds_max_delay_plus_jitter() {
        let profile = RetryProfile::WEBHOOK;
        for attempt in 0..10 {
            let delay = profile.delay_for(attempt);
            let ceiling = profile.max_delay.as_secs_f64() * (1.0 + profile.jitter);
            assert!(delay.as_secs_f64() <= ceiling);
        }
    }

    #[tokio::test]
    async fn retry_async_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_async(RetryProfile::DATABASE, || {
            let count = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_async_gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_async(RetryProfile::DATABASE, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err("always fails") }
        })
        .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(attempts.load(Ordering::SeqCst), RetryProfile::DATABASE.max_retries + 1);
    }
}
