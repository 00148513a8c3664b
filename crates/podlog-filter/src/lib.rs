//! Line filters applied while scanning a block range: keep/drop/short-circuit
//! decisions chained across a timestamp range check plus zero or more
//! (negative) regexp matches.

use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Utc};
use lru::LruCache;
use regex::Regex;

/// Outcome of a single filter stage, mirroring the four-way decision a block
/// scanner needs: keep scanning from here, skip straight past a range that
/// can't match, or stop scanning the block entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Line doesn't match; keep scanning later lines in this block.
    Filtered,
    /// Line matches every stage; hand it to the caller.
    Read,
    /// Line counts toward the bucket histogram but is not emitted as a raw
    /// line; no built-in filterer currently returns this, but it's part of
    /// the chain's result space so a future filterer can opt into it.
    SkipRead,
    /// Timestamp is past the end of the range; no later line in this block
    /// (or block order) can match either, so the caller can stop early.
    Done,
}

#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    #[error("invalid regular expression {0:?}: {1}")]
    InvalidRegex(String, #[source] regex::Error),
}

pub trait Filterer: Send + Sync {
    fn filter(&self, input: &str, ts: DateTime<Utc>) -> FilterResult;
}

/// Runs `input`/`ts` through each filterer in order, short-circuiting on the
/// first non-`Read` result.
pub fn do_filter(input: &str, ts: DateTime<Utc>, filterers: &[&dyn Filterer]) -> FilterResult {
    for filterer in filterers {
        match filterer.filter(input, ts) {
            FilterResult::Read => continue,
            other => return other,
        }
    }
    FilterResult::Read
}

pub struct RangeFilter {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl RangeFilter {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        RangeFilter { start, end }
    }
}

impl Filterer for RangeFilter {
    fn filter(&self, _input: &str, ts: DateTime<Utc>) -> FilterResult {
        if ts < self.start {
            FilterResult::Filtered
        } else if ts > self.end {
            FilterResult::Done
        } else {
            FilterResult::Read
        }
    }
}

/// Compiled regexes are expensive enough (and frequently repeated across
/// query shards hitting the same pattern) to share behind a small LRU.
fn regex_cache() -> &'static Mutex<LruCache<String, Regex>> {
    static CACHE: OnceLock<Mutex<LruCache<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(LruCache::new(NonZeroUsize::new(256).unwrap())))
}

fn compile_cached(expr: &str) -> Result<Regex, FilterError> {
    let mut cache = regex_cache().lock().unwrap();
    if let Some(re) = cache.get(expr) {
        return Ok(re.clone());
    }
    let compiled = Regex::new(expr).map_err(|e| FilterError::InvalidRegex(expr.to_string(), e))?;
    cache.put(expr.to_string(), compiled.clone());
    Ok(compiled)
}

pub struct RegexpFilterer {
    compiled: Regex,
}

impl RegexpFilterer {
    pub fn new(expr: &str) -> Result<Self, FilterError> {
        Ok(RegexpFilterer {
            compiled: compile_cached(expr)?,
        })
    }
}

impl Filterer for RegexpFilterer {
    fn filter(&self, input: &str, _ts: DateTime<Utc>) -> FilterResult {
        if self.compiled.is_match(input) {
            FilterResult::Read
        } else {
            FilterResult::Filtered
        }
    }
}

pub struct NegativeRegexpFilterer {
    compiled: Regex,
}

impl NegativeRegexpFilterer {
    pub fn new(expr: &str) -> Result<Self, FilterError> {
        Ok(NegativeRegexpFilterer {
            compiled: compile_cached(expr)?,
        })
    }
}

impl Filterer for NegativeRegexpFilterer {
    fn filter(&self, input: &str, _ts: DateTime<Utc>) -> FilterResult {
        if !self.compiled.is_match(input) {
            FilterResult::Read
        } else {
            FilterResult::Filtered
        }
    }
}
