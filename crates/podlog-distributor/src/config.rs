use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Distributor-wide knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DistributorConfig {
    /// Root under which `{ns}_{pod}_{uid}/{container}/{n}.log` std-stream
    /// files are discovered (the kubelet's log directory).
    pub stdstream_log_root_path: String,
    /// Root under which each pod's emptydir volumes live, searched at
    /// `{root}/{pod_uid}/volumes/kubernetes.io~empty-dir`.
    pub empty_dir_log_root_path: String,
    #[serde(with = "humantime_serde")]
    pub file_inspect_interval: Duration,
    /// Files whose `mod_time` is older than this are dropped from
    /// consideration entirely; must stay below `store.retentionTime`.
    #[serde(with = "humantime_serde")]
    pub file_inspect_max_stale: Duration,
    /// Only the newest file per stream within this age is added to the
    /// tail list; older streams are assumed to have rolled off already.
    #[serde(with = "humantime_serde")]
    pub tail_file_max_stale: Duration,
    #[serde(with = "humantime_serde")]
    pub match_lookback_min: Duration,
    #[serde(with = "humantime_serde")]
    pub metrics_interval: Duration,
    pub should_update_log_matcher: bool,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        DistributorConfig {
            stdstream_log_root_path: "/var/log/pods".to_string(),
            empty_dir_log_root_path: "/var/lib/kubelet/pods".to_string(),
            file_inspect_interval: Duration::from_secs(1),
            file_inspect_max_stale: Duration::from_secs(6 * 24 * 3600),
            tail_file_max_stale: Duration::from_secs(5),
            match_lookback_min: Duration::from_secs(10),
            metrics_interval: Duration::from_secs(5),
            should_update_log_matcher: false,
        }
    }
}
