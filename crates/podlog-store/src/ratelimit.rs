//! Rate limiter for the store's range handler: atomic counter with a
//! limit and a cooldown; on reaching the limit, hold the cool-down before
//! decrementing. Guards `/logs/range` only — listing and series are cheap
//! index scans, range scans do the expensive block I/O.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct RangeRateLimiter {
    limit: i64,
    cooldown: Duration,
    inflight: AtomicI64,
}

/// Releases the held slot (after the cool-down) when dropped, so a panic
/// or early return in the handler still frees it.
pub struct RateLimitGuard {
    limiter: Arc<RangeRateLimiter>,
}

impl RangeRateLimiter {
    pub fn new(limit: i64, cooldown: Duration) -> Arc<Self> {
        Arc::new(RangeRateLimiter {
            limit,
            cooldown,
            inflight: AtomicI64::new(0),
        })
    }

    /// Returns `None` (caller should answer 429) once `limit` concurrent
    /// range requests are already in flight.
    pub fn try_acquire(self: &Arc<Self>) -> Option<RateLimitGuard> {
        let current = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        if current > self.limit {
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(RateLimitGuard { limiter: self.clone() })
    }
}

impl Drop for RateLimitGuard {
    fn drop(&mut self) {
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limiter.cooldown).await;
            limiter.inflight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_once_the_limit_is_in_flight() {
        let limiter = RangeRateLimiter::new(1, Duration::from_millis(10));
        let first = limiter.try_acquire();
        assert!(first.is_some());
        assert!(limiter.try_acquire().is_none());
    }
}
