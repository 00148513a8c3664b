use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tailer-wide knobs, loaded once into an `Arc<TailerConfig>` and passed
/// into every `Tailer::spawn` call rather than read from module state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TailerConfig {
    /// How long to keep watching a path across a rotation before giving up.
    #[serde(with = "humantime_serde")]
    pub wait_time_after_rotation: Duration,
    /// Idle-detection tick: two consecutive ticks with no new line marks the
    /// tailer idle, so the distributor can reclaim it ahead of its next
    /// discovery pass.
    #[serde(with = "humantime_serde")]
    pub idle_tick: Duration,
    /// Lines older than this (relative to wall-clock time of ingestion) are
    /// dropped instead of forwarded, protecting a cold-start catch-up read
    /// from flooding the write path with ancient data.
    #[serde(with = "humantime_serde")]
    pub min_stale_time: Duration,
    pub show_tail_log: bool,
}

impl Default for TailerConfig {
    fn default() -> Self {
        TailerConfig {
            wait_time_after_rotation: Duration::from_secs(1),
            idle_tick: Duration::from_secs(30),
            min_stale_time: Duration::from_secs(3600),
            show_tail_log: false,
        }
    }
}
