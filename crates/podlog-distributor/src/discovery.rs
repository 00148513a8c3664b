//! Walks the kubelet's on-disk log layout to find candidate files:
//! std-stream rotations under `stdstream_log_root_path` named
//! `{ns}_{pod}_{uid}/{container}/{n}.log`, and emptydir volume files under
//! `empty_dir_log_root_path/{uid}/volumes/kubernetes.io~empty-dir`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use podlog_model::{Labels, LogFile, Source};

use crate::platform::PodInfo;

const EMPTYDIR_VOLUME_DIR: &str = "kubernetes.io~empty-dir";

/// Walks `root` for `{ns}_{pod}_{uid}/{container}/{n}.log` files, joining
/// each one's pod labels from `pods` when its UID is known. Files whose
/// pod directory can't be parsed, or whose `n` isn't a valid rotation
/// number, are skipped with a warning rather than aborting the whole scan.
pub fn discover_stdstream_files(root: &Path, pods: &BTreeMap<String, PodInfo>) -> Vec<LogFile> {
    let mut files = Vec::new();

    let Ok(pod_dirs) = std::fs::read_dir(root) else {
        return files;
    };

    for pod_entry in pod_dirs.flatten() {
        if !pod_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let dir_name = pod_entry.file_name().to_string_lossy().into_owned();
        let Some((namespace, pod, pod_uid)) = parse_pod_dir_name(&dir_name) else {
            tracing::warn!(dir = %dir_name, "skipping pod log directory with unexpected name");
            continue;
        };
        let labels = pods.get(&pod_uid).map(|p| p.labels.clone()).unwrap_or_default();

        let Ok(container_dirs) = std::fs::read_dir(pod_entry.path()) else {
            continue;
        };
        for container_entry in container_dirs.flatten() {
            if !container_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let container = container_entry.file_name().to_string_lossy().into_owned();

            let Ok(log_entries) = std::fs::read_dir(container_entry.path()) else {
                continue;
            };
            for log_entry in log_entries.flatten() {
                let file_name = log_entry.file_name().to_string_lossy().into_owned();
                let Some(number) = parse_rotation_number(&file_name) else {
                    continue;
                };
                let Ok(meta) = log_entry.metadata() else { continue };
                let mod_time: DateTime<Utc> = meta.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());

                files.push(LogFile {
                    namespace: namespace.clone(),
                    labels: labels.clone(),
                    pod: pod.clone(),
                    pod_uid: pod_uid.clone(),
                    container: container.clone(),
                    file_name: file_name.clone(),
                    path: log_entry.path().display().to_string(),
                    source: Source::std_stream(),
                    number,
                    mod_time,
                    inspected_size: meta.len() as i64,
                });
            }
        }
    }

    files
}

/// Walks every known pod's emptydir volumes for files a sink rule has
/// asked to tail directly, recursively
/// flattening each volume's directory tree into one [`Source::emptydir_file`]
/// per regular file, with the relative path (slashes preserved) as its tag.
pub fn discover_emptydir_files(root: &Path, pods: &BTreeMap<String, PodInfo>) -> Vec<LogFile> {
    let mut files = Vec::new();

    for pod in pods.values() {
        let volumes_dir = Path::new(root).join(&pod.uid).join("volumes").join(EMPTYDIR_VOLUME_DIR);
        let Ok(volume_dirs) = std::fs::read_dir(&volumes_dir) else {
            continue;
        };
        for volume_entry in volume_dirs.flatten() {
            if !volume_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            walk_emptydir_volume(&volume_entry.path(), &volume_entry.path(), pod, &mut files);
        }
    }

    files
}

fn walk_emptydir_volume(volume_root: &Path, dir: &Path, pod: &PodInfo, out: &mut Vec<LogFile>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            walk_emptydir_volume(volume_root, &path, pod, out);
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let relative = path.strip_prefix(volume_root).unwrap_or(&path).to_string_lossy().replace('/', "_");
        let mod_time: DateTime<Utc> = meta.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());

        out.push(LogFile {
            namespace: pod.namespace.clone(),
            labels: pod.labels.clone(),
            pod: pod.name.clone(),
            pod_uid: pod.uid.clone(),
            container: String::new(),
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path: path.display().to_string(),
            source: Source::emptydir_file(relative),
            number: 0,
            mod_time,
            inspected_size: meta.len() as i64,
        });
    }
}

fn parse_pod_dir_name(name: &str) -> Option<(String, String, String)> {
    let mut parts = name.splitn(2, '_');
    let namespace = parts.next()?.to_string();
    let rest = parts.next()?;
    let (pod, pod_uid) = rest.rsplit_once('_')?;
    Some((namespace, pod.to_string(), pod_uid.to_string()))
}

fn parse_rotation_number(file_name: &str) -> Option<i64> {
    file_name.strip_suffix(".log")?.parse::<i64>().ok()
}

/// Groups discovered files by stream identity, dropping any whose
/// `mod_time` is older than `max_stale` and sorting each stream's
/// remaining rotations oldest-first — the order the catch-up write path
/// expects to replay them in.
pub fn group_by_stream(files: Vec<LogFile>, max_stale: Duration, now: DateTime<Utc>) -> BTreeMap<String, Vec<LogFile>> {
    let cutoff = chrono::Duration::from_std(max_stale).unwrap_or_default();
    let mut grouped: BTreeMap<String, Vec<LogFile>> = BTreeMap::new();

    for file in files {
        if now - file.mod_time > cutoff {
            continue;
        }
        grouped.entry(file.id()).or_default().push(file);
    }

    for group in grouped.values_mut() {
        group.sort_by_key(|f| f.number);
    }

    grouped
}

/// Picks, per stream, the single newest rotation to hand a live tailer —
/// the rest of that stream's history is assumed already caught up by a
/// prior file-inspect pass. A stream whose newest file has gone stale
/// beyond `tail_file_max_stale` is dropped entirely: nothing is actively
/// being written to it anymore.
pub fn select_tail_candidates(grouped: &BTreeMap<String, Vec<LogFile>>, tail_file_max_stale: Duration, now: DateTime<Utc>) -> BTreeMap<String, LogFile> {
    let cutoff = chrono::Duration::from_std(tail_file_max_stale).unwrap_or_default();
    let mut tails = BTreeMap::new();

    for (id, files) in grouped {
        let Some(newest) = files.last() else { continue };
        if now - newest.mod_time > cutoff {
            continue;
        }
        tails.insert(id.clone(), newest.clone());
    }

    tails
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(number: i64, mod_time: DateTime<Utc>) -> LogFile {
        LogFile {
            namespace: "ns".into(),
            labels: Labels::default(),
            pod: "web-0".into(),
            pod_uid: "uid-1".into(),
            container: "app".into(),
            file_name: format!("{number}.log"),
            path: format!("/var/log/pods/ns_web-0_uid-1/app/{number}.log"),
            source: Source::std_stream(),
            number,
            mod_time,
            inspected_size: 0,
        }
    }

    #[test]
    fn parse_pod_dir_name_splits_from_the_right() {
        let (ns, pod, uid) = parse_pod_dir_name("default_web-7f8c9d6b5-abcde_uid-123").unwrap();
        assert_eq!(ns, "default");
        assert_eq!(pod, "web-7f8c9d6b5-abcde");
        assert_eq!(uid, "uid-123");
    }

    #[test]
    fn group_by_stream_drops_stale_files_and_sorts_by_rotation() {
        let now = Utc::now();
        let files = vec![file(1, now), file(0, now - chrono::Duration::seconds(1)), file(2, now - chrono::Duration::days(30))];
        let grouped = group_by_stream(files, Duration::from_secs(6 * 24 * 3600), now);
        let stream = grouped.get("ns_web-0_uid-1/app").unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[0].number, 0);
        assert_eq!(stream[1].number, 1);
    }

    #[test]
    fn select_tail_candidates_picks_the_newest_rotation_per_stream() {
        let now = Utc::now();
        let mut grouped = BTreeMap::new();
        grouped.insert("ns_web-0_uid-1/app".to_string(), vec![file(0, now - chrono::Duration::seconds(2)), file(1, now)]);

        let tails = select_tail_candidates(&grouped, Duration::from_secs(5), now);
        assert_eq!(tails.get("ns_web-0_uid-1/app").unwrap().number, 1);
    }

    #[test]
    fn select_tail_candidates_drops_streams_gone_stale() {
        let now = Utc::now();
        let mut grouped = BTreeMap::new();
        grouped.insert("ns_web-0_uid-1/app".to_string(), vec![file(0, now - chrono::Duration::seconds(60))]);

        let tails = select_tail_candidates(&grouped, Duration::from_secs(5), now);
        assert!(tails.is_empty());
    }
}
