// src/ingest/rate_limit.rs
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota};

/// Per-source-class spacing gate on top of a keyed GCRA limiter.
/// - Each class admits one call per `min_interval`, with no burst.
/// - Classes never wait on each other; only callers of the same class queue.
pub struct RateLimiter {
    min_interval: Duration,
    // `None` when spacing is disabled (zero interval).
    keyed: Option<DefaultKeyedRateLimiter<String>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        let keyed = Quota::with_period(min_interval).map(DefaultKeyedRateLimiter::<String>::keyed);
        Self { min_interval, keyed }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call for `class` is permitted.
    pub async fn throttle(&self, class: &str) {
        let Some(keyed) = &self.keyed else {
            return;
        };
        let key = class.to_string();
        if keyed.check_key(&key).is_ok() {
            return;
        }
        tracing::trace!(target: "ingest", class, "throttling");
        keyed.until_key_ready(&key).await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    // The limiter runs on its own monotonic clock, so these use wall time.

    #[tokio::test]
    async fn same_class_calls_are_spaced() {
        let rl = RateLimiter::new(Duration::from_millis(100));
        let t0 = Instant::now();
        rl.throttle("google").await;
        rl.throttle("google").await;
        rl.throttle("google").await;
        assert!(t0.elapsed() >= Duration::from_millis(190), "{:?}", t0.elapsed());
    }

    #[tokio::test]
    async fn different_classes_do_not_wait_on_each_other() {
        let rl = RateLimiter::new(Duration::from_millis(500));
        let t0 = Instant::now();
        rl.throttle("google").await;
        rl.throttle("bing").await;
        rl.throttle("yahoo").await;
        assert!(t0.elapsed() < Duration::from_millis(400), "{:?}", t0.elapsed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_class_callers_queue() {
        let rl = Arc::new(RateLimiter::new(Duration::from_millis(80)));
        let t0 = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rl = rl.clone();
                tokio::spawn(async move { rl.throttle("reuters").await })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        // first passes immediately, the other three wait one period each
        assert!(t0.elapsed() >= Duration::from_millis(230), "{:?}", t0.elapsed());
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let rl = RateLimiter::new(Duration::ZERO);
        let t0 = Instant::now();
        for _ in 0..50 {
            rl.throttle("google").await;
        }
        assert!(t0.elapsed() < Duration::from_millis(50));
    }
}
