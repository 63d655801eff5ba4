//! Requeue delay policies.
//!
//! ```text
//! MaxOfRateLimiter                 - longest delay of its members
//!   ├── ItemExponentialRateLimiter - base * 2^failures per key, capped
//!   └── BucketRateLimiter          - overall token bucket (qps, burst)
//! ```

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use runwarden_config::RateLimitSection;
use runwarden_types::WorkKey;
use tokio::time::Instant;

/// Decides how long a failed key waits before it is retried.
pub trait RateLimiter: Send + Sync {
    /// Delay before `key` may be processed again. Records a failure.
    fn when(&self, key: &WorkKey) -> Duration;

    /// Stop tracking `key`, typically after it succeeded or was dropped.
    fn forget(&self, key: &WorkKey);

    /// Number of failures recorded for `key` since it was last forgotten.
    fn num_requeues(&self, key: &WorkKey) -> u32;
}

/// Per-key exponential backoff: `base * 2^failures`, capped at `max`.
pub struct ItemExponentialRateLimiter {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<WorkKey, u32>>,
}

impl ItemExponentialRateLimiter {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn backoff(&self, exponent: u32) -> Duration {
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl RateLimiter for ItemExponentialRateLimiter {
    fn when(&self, key: &WorkKey) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.clone()).or_insert(0);
        let exponent = *count;
        *count = count.saturating_add(1);
        self.backoff(exponent)
    }

    fn forget(&self, key: &WorkKey) {
        self.failures.lock().remove(key);
    }

    fn num_requeues(&self, key: &WorkKey) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Overall token bucket shared by every key.
///
/// Refills at `qps` tokens per second up to `burst`. Each call to
/// [`RateLimiter::when`] reserves one token; a negative balance turns into a
/// delay. Does not track individual keys.
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl BucketRateLimiter {
    pub fn new(qps: u32, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            qps: f64::from(qps.max(1)),
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }
}

impl RateLimiter for BucketRateLimiter {
    fn when(&self, _key: &WorkKey) -> Duration {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(self.burst);
        bucket.last = now;

        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.qps)
        }
    }

    fn forget(&self, _key: &WorkKey) {}

    fn num_requeues(&self, _key: &WorkKey) -> u32 {
        0
    }
}

/// Combines limiters, answering with the longest delay of any member.
pub struct MaxOfRateLimiter {
    limiters: Vec<Box<dyn RateLimiter>>,
}

impl MaxOfRateLimiter {
    pub fn new(limiters: Vec<Box<dyn RateLimiter>>) -> Self {
        Self { limiters }
    }
}

impl RateLimiter for MaxOfRateLimiter {
    fn when(&self, key: &WorkKey) -> Duration {
        // Every member must record the failure, so no short-circuiting.
        self.limiters
            .iter()
            .map(|limiter| limiter.when(key))
            .fold(Duration::ZERO, Duration::max)
    }

    fn forget(&self, key: &WorkKey) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn num_requeues(&self, key: &WorkKey) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// Per-key exponential backoff combined with an overall token bucket.
pub fn default_controller_rate_limiter(config: &RateLimitSection) -> MaxOfRateLimiter {
    MaxOfRateLimiter::new(vec![
        Box::new(ItemExponentialRateLimiter::new(config.base_delay(), config.max_delay())),
        Box::new(BucketRateLimiter::new(config.qps, config.burst)),
    ])
}
