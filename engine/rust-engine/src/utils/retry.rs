use rand;
use std::time::Duration;

#[derive(Clone)]
pub struct BackoffPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(800),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl BackoffPolicy {
    /// Preset for collaborator HTTP calls (assessment fetch, result forwarding).
    pub fn collaborator() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1500),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    /// Exponential delay for the given zero-based failure count, capped at
    /// `max_delay`, before jitter.
    fn delay_for(&self, failure: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(failure));
        std::cmp::min(exp, self.max_delay)
    }
}

pub async fn retry_with_backoff<F, Fut, T, E>(policy: BackoffPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut failures: u32 = 0;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                failures += 1;
                if failures as usize >= policy.max_attempts {
                    return Err(e);
                }

                let mut wait = policy.delay_for(failures - 1);
                if let Some(jitter_max) = policy.jitter_max {
                    let jitter_ms = jitter_max.as_millis() as u64;
                    if jitter_ms > 0 {
                        let extra = rand::random::<u64>() % (jitter_ms + 1);
                        wait += Duration::from_millis(extra);
                    }
                }
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retry_succeeds_after_retries() {
        let counter = AtomicUsize::new(0);
        let policy = BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter_max: None,
        };

        let res: Result<usize, &'static str> = retry_with_backoff(policy, || async {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("fail")
            } else {
                Ok(n)
            }
        })
        .await;

        assert!(res.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_fails_after_max_attempts() {
        let counter = AtomicUsize::new(0);
        let policy = BackoffPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter_max: None,
        };

        let res: Result<(), &'static str> = retry_with_backoff(policy, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("always fail")
        })
        .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delay_schedule_is_capped() {
        let policy = BackoffPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            jitter_max: None,
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(9), Duration::from_millis(500));
    }
}
