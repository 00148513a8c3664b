use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::labels::Labels;
use crate::source::{Source, LOG_TYPE_DELIMITER};

/// One on-disk container log file discovered by the distributor's file
/// inspection loop. `number` is the rotation generation extracted from the
/// file name; files for one stream form an ordered sequence by `number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFile {
    pub namespace: String,
    pub labels: Labels,
    pub pod: String,
    pub pod_uid: String,
    pub container: String,
    pub file_name: String,
    pub path: String,
    pub source: Source,
    pub number: i64,
    pub mod_time: DateTime<Utc>,
    pub inspected_size: i64,
}

impl LogFile {
    pub fn relative_pod_dir(&self) -> String {
        format!("{}_{}_{}", self.namespace, self.pod, self.pod_uid)
    }

    pub fn relative_block_dir(&self) -> String {
        if self.source.is_emptydir() {
            format!(
                "{}/{}{}{}",
                self.relative_pod_dir(),
                self.source.source_type,
                LOG_TYPE_DELIMITER,
                self.source.path
            )
        } else {
            format!("{}/{}", self.relative_pod_dir(), self.container)
        }
    }

    /// Identity used to group rotated files of the same stream and to key
    /// the distributor's tailer cache.
    pub fn id(&self) -> String {
        self.relative_block_dir()
    }
}
