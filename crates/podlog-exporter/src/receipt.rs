//! Per-order export bookkeeping: one `Receipt` per chunk key, persisted in
//! RocksDB so a process restart doesn't re-export everything. A single
//! `rocksdb::DB`, `get_pinned`/`put` for point reads/writes, and a
//! `thiserror` enum wrapping `rocksdb::Error`.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ReceiptError {
    #[error("receipt store error: {0}")]
    Rocks(#[from] rocksdb::Error),
    #[error("receipt decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tracks how far an order's export has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub bytes: i64,
    pub export_time: DateTime<Utc>,
    pub log_time: DateTime<Utc>,
}

impl Receipt {
    pub fn fresh(current: DateTime<Utc>, interval: Duration) -> Self {
        let back = chrono::Duration::from_std(interval).unwrap_or_default();
        Receipt {
            bytes: 0,
            export_time: current - back,
            log_time: current - back,
        }
    }

    /// True once `interval` has elapsed since the last export attempt;
    /// the tick that finds this false skips the order entirely.
    pub fn due(&self, current: DateTime<Utc>, interval: Duration) -> bool {
        let interval = chrono::Duration::from_std(interval).unwrap_or_default();
        current - self.export_time.duration_trunc(chrono::Duration::seconds(1)).unwrap_or(self.export_time) >= interval
    }

    /// Start of the next export window: one nanosecond past the last
    /// exported line (a coarser "+1 ms" collapses to this under
    /// nanosecond timestamps).
    pub fn next_start(&self) -> DateTime<Utc> {
        self.log_time + chrono::Duration::nanoseconds(1)
    }

    pub fn record(&mut self, exported_bytes: i64, current: DateTime<Utc>, last_page_end: DateTime<Utc>) {
        self.bytes += exported_bytes;
        self.export_time = current;
        self.log_time = last_page_end;
    }
}

use chrono::DurationRound;

pub struct ReceiptStore {
    db: rocksdb::DB,
}

impl ReceiptStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReceiptError> {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        let db = rocksdb::DB::open(&opts, path)?;
        Ok(ReceiptStore { db })
    }

    pub fn load_or_create(&self, key: &str, current: DateTime<Utc>, interval: Duration) -> Result<Receipt, ReceiptError> {
        match self.db.get_pinned(key)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Receipt::fresh(current, interval)),
        }
    }

    pub fn store(&self, key: &str, receipt: &Receipt) -> Result<(), ReceiptError> {
        let bytes = serde_json::to_vec(receipt)?;
        self.db.put(key, bytes).map_err(Into::into)
    }

    /// Drops receipts for orders the exporter hasn't
    /// re-touched in a while, since their sink/rule no longer matches
    /// anything currently held.
    pub fn prune_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> Result<usize, ReceiptError> {
        let mut stale_keys = Vec::new();
        for item in self.db.iterator(rocksdb::IteratorMode::Start) {
            let (key, value) = item?;
            let Ok(receipt) = serde_json::from_slice::<Receipt>(&value) else {
                continue;
            };
            if now - receipt.export_time > max_age {
                stale_keys.push(key);
            }
        }
        let count = stale_keys.len();
        for key in &stale_keys {
            self.db.delete(key)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn fresh_receipt_is_interval_behind_current() {
        let current = Utc::now();
        let receipt = Receipt::fresh(current, StdDuration::from_secs(60));
        assert_eq!(receipt.bytes, 0);
        assert_eq!(current - receipt.export_time, chrono::Duration::seconds(60));
    }

    #[test]
    fn store_and_load_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ReceiptStore::open(dir.path()).unwrap();
        let current = Utc::now();
        let receipt = Receipt::fresh(current, StdDuration::from_secs(60));
        store.store("key-a", &receipt).unwrap();

        let reloaded = store.load_or_create("key-a", current, StdDuration::from_secs(60)).unwrap();
        assert_eq!(reloaded, receipt);
    }

    #[test]
    fn load_or_create_returns_fresh_receipt_for_unknown_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ReceiptStore::open(dir.path()).unwrap();
        let current = Utc::now();
        let receipt = store.load_or_create("unseen", current, StdDuration::from_secs(30)).unwrap();
        assert_eq!(receipt.bytes, 0);
    }

    #[test]
    fn due_is_false_immediately_after_an_export() {
        let current = Utc::now();
        let mut receipt = Receipt::fresh(current, StdDuration::from_secs(60));
        receipt.record(100, current, current);
        assert!(!receipt.due(current, StdDuration::from_secs(60)));
    }

    #[test]
    fn due_is_true_once_interval_has_elapsed() {
        let current = Utc::now();
        let mut receipt = Receipt::fresh(current, StdDuration::from_secs(60));
        let earlier = current - chrono::Duration::seconds(120);
        receipt.record(100, earlier, earlier);
        assert!(receipt.due(current, StdDuration::from_secs(60)));
    }

    #[test]
    fn prune_stale_removes_receipts_past_max_age() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ReceiptStore::open(dir.path()).unwrap();
        let now = Utc::now();
        let old = Receipt {
            bytes: 10,
            export_time: now - chrono::Duration::hours(10),
            log_time: now - chrono::Duration::hours(10),
        };
        let fresh = Receipt::fresh(now, StdDuration::from_secs(60));
        store.store("old", &old).unwrap();
        store.store("fresh", &fresh).unwrap();

        let removed = store.prune_stale(now, chrono::Duration::hours(1)).unwrap();
        assert_eq!(removed, 1);
        assert!(store.db.get_pinned("old").unwrap().is_none());
        assert!(store.db.get_pinned("fresh").unwrap().is_some());
    }
}
