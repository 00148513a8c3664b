//! Disk-pressure helpers backing the mark pass's eviction check: current
//! usage ratio of the filesystem under the store root, and a plain
//! subdirectory count used when reconstructing block directories.

use std::path::Path;

use sysinfo::Disks;

/// Fraction of total space in use on the filesystem mounting `path`'s
/// longest matching mount point, or `None` if no disk claims it.
pub fn disk_usage_ratio(path: &Path) -> Option<f64> {
    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(&std::path::Path, u64, u64)> = None;

    for disk in disks.list() {
        let mount = disk.mount_point();
        if !path.starts_with(mount) {
            continue;
        }
        let mount_len = mount.as_os_str().len();
        if best.map(|(m, _, _)| mount_len > m.as_os_str().len()).unwrap_or(true) {
            best = Some((mount, disk.total_space(), disk.available_space()));
        }
    }

    best.map(|(_, total, available)| {
        if total == 0 {
            0.0
        } else {
            (total.saturating_sub(available)) as f64 / total as f64
        }
    })
}

/// Number of immediate subdirectories of `path`, used by `init_chunks` to
/// tell an empty pod directory from one still holding block subdirectories.
pub fn count_sub_directories(path: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            count += 1;
        }
    }
    Ok(count)
}
