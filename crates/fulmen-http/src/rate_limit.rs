//! Rate limiting for admin endpoints. Replaceable by design.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait RateLimiter: Send + Sync {
    /// `true` if the request for `client_id` is allowed to proceed.
    fn allow(&self, client_id: &str) -> bool;
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A simple in-memory token bucket, one bucket per client id.
pub struct InMemoryRateLimiter {
    capacity: f64,
    refill_per_second: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl InMemoryRateLimiter {
    #[must_use]
    pub fn new(capacity: f64, refill_per_second: f64) -> Self {
        InMemoryRateLimiter { capacity, refill_per_second, buckets: Mutex::new(HashMap::new()) }
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn allow(&self, client_id: &str) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter bucket map poisoned");
        let now = Instant::now();
        let bucket = buckets.entry(client_id.to_string()).or_insert_with(|| Bucket { tokens: self.capacity, last_refill: now });
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_second).min(self.capacity);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Never limits; useful for tests and disabled-rate-limiting configurations.
pub struct NoRateLimit;

impl RateLimiter for NoRateLimit {
    fn allow(&self, _client_id: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity_then_denies() {
        let limiter = InMemoryRateLimiter::new(2.0, 0.0);
        assert!(limiter.allow("client-a"));
        assert!(limiter.allow("client-a"));
        assert!(!limiter.allow("client-a"));
    }

    #[test]
    fn separate_clients_have_separate_buckets() {
        let limiter = InMemoryRateLimiter::new(1.0, 0.0);
        assert!(limiter.allow("client-a"));
        assert!(limiter.allow("client-b"));
        assert!(!limiter.allow("client-a"));
    }

    #[test]
    fn refills_over_time() {
        let limiter = InMemoryRateLimiter::new(1.0, 1000.0);
        assert!(limiter.allow("client-a"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.allow("client-a"));
    }
}
