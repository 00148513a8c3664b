//! On-disk path helpers for the store root:
//!
//! ```text
//! {ns}_{pod}_{pod_uid}/
//!   labels
//!   {container}/                    # std-stream
//!     checkpoint
//!     temp.log
//!     {start}_{end}_{lines}_{fileNum}.log ...
//!   emptydir-file::{sanitized_path}/ # emptydir
//!     ...
//! ```

use std::path::{Path, PathBuf};

use podlog_model::block::TEMP_BLOCK_FILE_NAME;
use podlog_model::check_point::CHECK_POINT_FILE_NAME;
use podlog_model::labels::LABELS_FILE_NAME;
use podlog_model::Chunk;

pub fn pod_dir(root: &Path, chunk: &Chunk) -> PathBuf {
    root.join(&chunk.relative_pod_dir)
}

pub fn block_dir(root: &Path, chunk: &Chunk) -> PathBuf {
    root.join(&chunk.relative_block_dir)
}

pub fn checkpoint_path(root: &Path, chunk: &Chunk) -> PathBuf {
    block_dir(root, chunk).join(CHECK_POINT_FILE_NAME)
}

pub fn temp_log_path(root: &Path, chunk: &Chunk) -> PathBuf {
    block_dir(root, chunk).join(TEMP_BLOCK_FILE_NAME)
}

pub fn labels_path(root: &Path, chunk: &Chunk) -> PathBuf {
    pod_dir(root, chunk).join(LABELS_FILE_NAME)
}

/// `strings.Replace(Replace(path, emptydirRoot, ""), "/", "_")`: collapses
/// an emptydir volume's absolute host path into a single safe path segment.
pub fn sanitize_emptydir_path(path: &str, emptydir_root: &str) -> String {
    path.replacen(emptydir_root, "", 1).replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_a_host_path_under_the_emptydir_root() {
        let sanitized = sanitize_emptydir_path("/var/lib/kubelet/pods/uid/volumes/empty/app-logs/out.log", "/var/lib/kubelet/pods/uid/volumes/empty/");
        assert_eq!(sanitized, "app-logs_out.log");
    }
}
