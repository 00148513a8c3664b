//! Per-chunk admission tracker built on top of [`crate::Limiter`]'s tiers:
//! `init` resets the running size/line counters for a new interval and
//! (re)acquires the smallest tier; `pour` grows the counters and promotes
//! into a larger tier once the current one's size cap is exceeded,
//! rejecting the write only once every tier (including the forced
//! fallback) is too small or full.

use crate::Limiter;

/// Returned by [`LeakyBucket::pour`] when the line is rejected; carries the
/// human-readable reason the write path folds into its synthetic marker
/// line (`"(lobster: Logs exceeding {reason} were limited)"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected(pub String);

pub struct LeakyBucket<'a> {
    limiter: &'a Limiter,
    guard: Option<crate::LimitGuard<'a>>,
    size: i64,
    lines: i64,
}

impl<'a> LeakyBucket<'a> {
    pub fn new(limiter: &'a Limiter) -> Self {
        let mut bucket = LeakyBucket {
            limiter,
            guard: None,
            size: 0,
            lines: 0,
        };
        bucket.init();
        bucket
    }

    /// Resets size/line counters for a new interval and releases the
    /// current tier before acquiring a fresh one sized for zero bytes
    /// (always tier 0).
    pub fn init(&mut self) {
        self.size = 0;
        self.lines = 0;
        self.guard = None;
        self.guard = Some(self.limiter.acquire(0));
    }

    /// Admits `n` more bytes (one line). On success, returns `Ok(())` and
    /// counters reflect the new total; on rejection, counters are left as
    /// they were before this call so the caller can retry the same
    /// interval's next line against the same state.
    pub fn pour(&mut self, n: i64) -> Result<(), Rejected> {
        let next_size = self.size + n;
        let current_tier = self.guard.as_ref().expect("guard set by init").stat();

        if next_size > current_tier.size {
            let promoted = self.limiter.acquire(next_size);
            let tier = promoted.stat();
            if next_size > tier.size {
                // Every tier, including the forced fallback, is too small
                // for this total: reject without mutating state or losing
                // the still-valid guard.
                return Err(Rejected(format!("Size limit({} bytes) reached", tier.size)));
            }
            self.guard = Some(promoted);
        }

        let tier = self.guard.as_ref().unwrap().stat();
        if self.lines + 1 > tier.lines {
            return Err(Rejected(format!("Line count limit({}) reached", tier.lines)));
        }

        self.size = next_size;
        self.lines += 1;
        Ok(())
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn lines(&self) -> i64 {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Limiter;

    #[test]
    fn accepts_writes_within_first_tier() {
        let limiter = Limiter::new();
        let mut bucket = LeakyBucket::new(&limiter);
        for _ in 0..10 {
            bucket.pour(1_000).unwrap();
        }
        assert_eq!(bucket.size(), 10_000);
    }

    #[test]
    fn promotes_into_a_larger_tier_once_size_cap_is_exceeded() {
        let limiter = Limiter::new();
        let mut bucket = LeakyBucket::new(&limiter);
        // first tier caps at 1_000_000 bytes; push well past it in one go.
        bucket.pour(2_000_000).unwrap();
        assert_eq!(bucket.size(), 2_000_000);
    }

    #[test]
    fn rejects_once_every_tier_is_too_small() {
        let limiter = Limiter::new();
        let mut bucket = LeakyBucket::new(&limiter);
        let err = bucket.pour(31_000_000).unwrap_err();
        assert!(err.0.contains("Size limit"));
    }

    #[test]
    fn rejects_once_line_count_cap_is_exceeded() {
        let limiter = Limiter::new();
        let mut bucket = LeakyBucket::new(&limiter);
        for _ in 0..30_000 {
            bucket.pour(1).unwrap();
        }
        let err = bucket.pour(1).unwrap_err();
        assert!(err.0.contains("Line count limit"));
    }

    #[test]
    fn init_resets_counters_for_a_new_interval() {
        let limiter = Limiter::new();
        let mut bucket = LeakyBucket::new(&limiter);
        bucket.pour(500).unwrap();
        bucket.init();
        assert_eq!(bucket.size(), 0);
        assert_eq!(bucket.lines(), 0);
    }
}
