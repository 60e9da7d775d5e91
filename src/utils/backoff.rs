use std::time::Duration;

use rand::Rng;

/// Retry schedule shared by the fetch and the sink paths: every delay is
/// `base` plus a uniformly random jitter in `[0, jitter)`.
///
/// ```
/// use std::time::Duration;
/// use stone_indexer::BackoffPolicy;
///
/// let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(2), Some(3));
/// let delays: Vec<_> = policy.delays().collect();
/// assert_eq!(delays.len(), 3);
/// assert!(delays.iter().all(|d| *d >= Duration::from_secs(1) && *d < Duration::from_secs(3)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    jitter: Duration,
    /// Number of retries before giving up. None retries indefinitely.
    max_retries: Option<u32>,
}

impl BackoffPolicy {
    pub const fn new(base: Duration, jitter: Duration, max_retries: Option<u32>) -> Self {
        Self {
            base,
            jitter,
            max_retries,
        }
    }

    /// 1-3 seconds, forever. Used between fetch attempts.
    pub const fn fetch() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(2), None)
    }

    /// 1-11 seconds while the sink reports rate limiting.
    ///
    /// `attempt_cap` is the configured number of rate-limited attempts a
    /// single write may make, `-1` for no limit. The last permitted attempt is
    /// not followed by a sleep, so a cap of `n` allows `n - 1` retries.
    pub fn rate_limited(attempt_cap: i64) -> Self {
        let max_retries = if attempt_cap < 0 {
            None
        } else {
            Some(u32::try_from(attempt_cap.saturating_sub(1).max(0)).unwrap_or(u32::MAX))
        };
        Self::new(Duration::from_secs(1), Duration::from_secs(10), max_retries)
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// A fresh schedule; each retry loop takes its own.
    pub fn delays(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 0,
        }
    }

    /// A single delay, for loops that never run out of retries.
    pub fn delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..self.jitter.as_millis() as u64);
        self.base + Duration::from_millis(jitter_ms)
    }
}

/// Iterator over the delays of one retry loop. `None` means the budget is
/// spent.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    /// Retries handed out so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(max_retries) = self.policy.max_retries {
            if self.attempt >= max_retries {
                return None;
            }
        }
        self.attempt = self.attempt.saturating_add(1);
        Some(self.policy.delay())
    }
}
