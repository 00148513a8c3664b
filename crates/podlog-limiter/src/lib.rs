//! Tiered leaky-bucket admission control for the write path: a chunk
//! picks a tier sized to its recent write volume and holds a slot in it for
//! the duration of a flush, spilling into neighboring tiers when its
//! preferred one is saturated.

use std::sync::Mutex;

pub mod leaky_bucket;
pub use leaky_bucket::LeakyBucket;

/// A single admission tier: `cap` concurrent flushes of chunks whose
/// buffered size is within `size` bytes / `lines` lines may run at once.
pub struct Limit {
    cap: usize,
    used: Mutex<usize>,
    size: i64,
    lines: i64,
    description: &'static str,
}

/// Snapshot of a [`Limit`]'s configuration and current occupancy.
#[derive(Debug, Clone, Copy)]
pub struct LimitStat {
    pub cap: usize,
    pub used: usize,
    pub size: i64,
    pub lines: i64,
    pub description: &'static str,
}

impl Limit {
    fn new(cap: usize, size: i64, lines: i64, description: &'static str) -> Self {
        Limit {
            cap,
            used: Mutex::new(0),
            size,
            lines,
            description,
        }
    }

    pub fn stat(&self) -> LimitStat {
        LimitStat {
            cap: self.cap,
            used: *self.used.lock().unwrap(),
            size: self.size,
            lines: self.lines,
            description: self.description,
        }
    }

    fn use_slot(&self) {
        *self.used.lock().unwrap() += 1;
    }

    fn use_if_available(&self) -> bool {
        let mut used = self.used.lock().unwrap();
        if *used < self.cap {
            *used += 1;
            true
        } else {
            false
        }
    }

    pub fn release(&self) {
        let mut used = self.used.lock().unwrap();
        *used = used.saturating_sub(1);
    }
}

/// Ordered set of write tiers, from smallest to largest, that a flush can
/// be admitted into based on how much data it's about to write.
pub struct Limiter {
    limits: Vec<Limit>,
}

/// An acquired slot in one of a [`Limiter`]'s tiers; releases it on drop.
pub struct LimitGuard<'a> {
    limit: &'a Limit,
    index: usize,
}

impl LimitGuard<'_> {
    /// Index of the tier this guard holds a slot in, from smallest (0) to
    /// largest. Used by [`crate::leaky_bucket::LeakyBucket`] to re-read that
    /// tier's size/line caps after acquiring it.
    pub fn tier_index(&self) -> usize {
        self.index
    }

    pub fn stat(&self) -> LimitStat {
        self.limit.stat()
    }
}

impl Drop for LimitGuard<'_> {
    fn drop(&mut self) {
        self.limit.release();
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Limiter::new()
    }
}

impl Limiter {
    pub fn new() -> Self {
        let limits = vec![
            Limit::new(999, 1_000_000, 30_000, "1MB/s | 30k lines/s"),
            Limit::new(30, 20_000_000, 30_000, "20MB/s | 30k lines/s"),
            Limit::new(30, 30_000_000, 30_000, "30MB/s | 30k lines/s"),
        ];
        Limiter { limits }
    }

    pub fn limits(&self) -> impl Iterator<Item = LimitStat> + '_ {
        self.limits.iter().map(Limit::stat)
    }

    /// Admits a flush of `current` bytes, preferring the smallest tier that
    /// comfortably fits it, spilling upward then downward through the
    /// remaining tiers, and finally forcing entry into the smallest tier if
    /// every tier is saturated.
    pub fn acquire(&self, current: i64) -> LimitGuard<'_> {
        let mut idx = self.limits.len() - 1;
        for (i, limit) in self.limits.iter().enumerate() {
            if current <= limit.size {
                idx = i;
                break;
            }
        }

        for (offset, limit) in self.limits[idx..].iter().enumerate() {
            if limit.use_if_available() {
                return LimitGuard { limit, index: idx + offset };
            }
        }

        for (i, limit) in self.limits[..=idx].iter().enumerate().rev() {
            if limit.use_if_available() {
                return LimitGuard { limit, index: i };
            }
        }

        self.default_limit()
    }

    /// This tier's configured byte/line caps per interval, independent of
    /// any currently-held guard.
    pub fn tier_stat(&self, index: usize) -> LimitStat {
        self.limits[index].stat()
    }

    fn default_limit(&self) -> LimitGuard<'_> {
        let limit = &self.limits[0];
        limit.use_slot();
        LimitGuard { limit, index: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_write_prefers_first_tier() {
        let limiter = Limiter::new();
        let guard = limiter.acquire(1_000);
        assert_eq!(guard.limit.description, "1MB/s | 30k lines/s");
        assert_eq!(limiter.limits[0].stat().used, 1);
    }

    #[test]
    fn release_frees_the_slot() {
        let limiter = Limiter::new();
        {
            let _guard = limiter.acquire(25_000_000);
            assert_eq!(limiter.limits[2].stat().used, 1);
        }
        assert_eq!(limiter.limits[2].stat().used, 0);
    }

    #[test]
    fn saturated_tier_spills_to_default_when_all_full() {
        let limiter = Limiter::new();
        let mut guards = Vec::new();
        for _ in 0..999 {
            guards.push(limiter.acquire(1_000));
        }
        // tier 0 is now full; a further small write spills upward through 1/2
        let extra = limiter.acquire(1_000);
        assert_eq!(extra.limit.description, "20MB/s | 30k lines/s");
    }
}
