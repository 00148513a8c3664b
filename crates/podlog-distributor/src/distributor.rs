//! Drives the two periodic loops that keep a node's [`podlog_store::Store`]
//! in sync with what's actually on disk: a file-inspect pass
//! that discovers, catches up, and starts/stops tailers, and a metrics pass
//! that reports per-chunk and per-tier gauges.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use podlog_logline::LogFormat;
use podlog_model::LogFile;
use podlog_store::key::ChunkKey;
use podlog_store::write::{move_tempblock, write_filed_logs, write_tailed_logs};
use podlog_store::Store;
use podlog_tailer::{Tailer, TailerConfig};

use crate::config::DistributorConfig;
use crate::discovery::{discover_emptydir_files, discover_stdstream_files, group_by_stream, select_tail_candidates};
use crate::error::DistributorError;
use crate::platform::PodProvider;

/// Called once per line as it's written, so sink/metric-rule matching
/// (bounded by `match_lookback_min`) can run without the store or
/// distributor knowing anything about sinks. `None` is a no-op.
pub type MatchHandler = Arc<dyn Fn(&str, chrono::DateTime<Utc>) + Send + Sync>;

struct RunningTailer {
    tailer: Tailer,
    writer: tokio::task::JoinHandle<()>,
}

pub struct Distributor {
    store: Arc<Store>,
    config: Arc<DistributorConfig>,
    tailer_config: Arc<TailerConfig>,
    pods: Arc<dyn PodProvider>,
    format: LogFormat,
    tailers: DashMap<String, RunningTailer>,
    handler: Option<MatchHandler>,
}

impl Distributor {
    pub fn new(store: Arc<Store>, config: Arc<DistributorConfig>, tailer_config: Arc<TailerConfig>, pods: Arc<dyn PodProvider>, format: LogFormat, handler: Option<MatchHandler>) -> Self {
        Distributor {
            store,
            config,
            tailer_config,
            pods,
            format,
            tailers: DashMap::new(),
            handler,
        }
    }

    /// Runs both periodic loops until cancelled. Intended to be spawned as
    /// its own task; errors from a single inspect pass are logged and
    /// don't stop the loop, matching the reference implementation's
    /// tolerance for a transient disk/kubelet hiccup.
    pub async fn run(self: Arc<Self>) {
        let mut inspect_ticker = tokio::time::interval(self.config.file_inspect_interval);
        let mut metrics_ticker = tokio::time::interval(self.config.metrics_interval);

        loop {
            tokio::select! {
                _ = inspect_ticker.tick() => {
                    if let Err(e) = self.inspect_once().await {
                        tracing::warn!(error = %e, "file inspect pass failed");
                    }
                }
                _ = metrics_ticker.tick() => {
                    self.update_metrics().await;
                }
            }
        }
    }

    async fn inspect_once(&self) -> Result<(), DistributorError> {
        let pods = self.pods.get_pods().await;
        let now = Utc::now();

        let mut files = discover_stdstream_files(std::path::Path::new(&self.config.stdstream_log_root_path), &pods);
        files.extend(discover_emptydir_files(std::path::Path::new(&self.config.empty_dir_log_root_path), &pods));

        let grouped = group_by_stream(files, self.config.file_inspect_max_stale, now);
        let tail_candidates = select_tail_candidates(&grouped, self.config.tail_file_max_stale, now);

        for (id, group) in &grouped {
            if self.tailers.contains_key(id) {
                self.handle_rotation_or_truncation(id, group).await?;
                continue;
            }
            self.catch_up(group).await?;
        }

        for (id, file) in &tail_candidates {
            if !self.tailers.contains_key(id) {
                self.start_tailing(file.clone()).await?;
            }
        }

        let stale_ids: Vec<String> = self
            .tailers
            .iter()
            .map(|e| e.key().clone())
            .filter(|id| !tail_candidates.contains_key(id))
            .collect();
        for id in stale_ids {
            self.stop_tailing(&id).await;
        }

        Ok(())
    }

    /// Reads every not-yet-tailed rotation of a stream front to back,
    /// folding it into the chunk's blocks. Safe to re-run: block names are
    /// content-addressed, so re-reading an already-ingested file is a
    /// no-op write.
    async fn catch_up(&self, files: &[LogFile]) -> Result<(), DistributorError> {
        let Some(first) = files.first() else { return Ok(()) };
        let key = self.store.get_or_create_chunk(first, Some(podlog_model::CheckPoint::new(-1, 0)))?;

        let handler = self.handler.clone();
        let mut error = None;
        self.store
            .update_chunk(&key, |chunk| {
                if let Err(e) = write_filed_logs(self.store.root(), &self.store.config, chunk, self.format, files, handler.as_deref()) {
                    error = Some(e);
                }
            })
            .await;

        if let Some(e) = error {
            return Err(e.into());
        }
        Ok(())
    }

    /// A stream already has a live tailer; check whether rotation has
    /// moved it onto a new file number before falling back to the
    /// truncation check. `group` holds every rotation still within
    /// `file_inspect_max_stale`, oldest first.
    async fn handle_rotation_or_truncation(&self, id: &str, group: &[LogFile]) -> Result<(), DistributorError> {
        let Some(newest) = group.last() else { return Ok(()) };
        let key = ChunkKey::new(newest.pod_uid.clone(), newest.container.clone(), newest.source.clone());
        let Some(chunk) = self.store.load_chunk(&key).await else {
            return Ok(());
        };
        let Some(cp) = chunk.check_point else { return Ok(()) };

        let new_files: Vec<LogFile> = group.iter().filter(|f| f.number > cp.file_num).cloned().collect();
        if new_files.is_empty() {
            return self.check_for_truncation(id, group).await;
        }

        let new_file_num = new_files.last().map(|f| f.number).unwrap_or(cp.file_num);
        let old_file_num = cp.file_num;
        tracing::info!(stream = %id, old_file_num, new_file_num, "rotation detected, sealing temp block under the old file number");

        self.stop_tailing(id).await;

        let root = self.store.root().to_path_buf();
        let mut error = None;
        self.store
            .update_chunk(&key, |chunk| {
                if let Err(e) = move_tempblock(&root, chunk, old_file_num, new_file_num) {
                    error = Some(e);
                    return;
                }
                chunk.check_point = Some(podlog_model::CheckPoint::new(new_file_num, 0));
            })
            .await;
        if let Some(e) = error {
            return Err(e.into());
        }

        self.catch_up(&new_files).await
    }

    /// A tailed file whose size has dropped below its checkpoint offset
    /// has been truncated out from under the tailer (log rotation racing
    /// ahead of it, or the container runtime clearing it): stop the old
    /// tailer, reset the checkpoint, and let the next pass catch it up and
    /// restart tailing from scratch.
    async fn check_for_truncation(&self, id: &str, files: &[LogFile]) -> Result<(), DistributorError> {
        let Some(newest) = files.last() else { return Ok(()) };
        let key = ChunkKey::new(newest.pod_uid.clone(), newest.container.clone(), newest.source.clone());
        let Some(chunk) = self.store.load_chunk(&key).await else {
            return Ok(());
        };
        let Some(cp) = chunk.check_point else { return Ok(()) };
        if cp.file_num != newest.number || newest.inspected_size >= cp.offset {
            return Ok(());
        }

        tracing::warn!(stream = %id, "detected truncated log file, restarting tailer");
        self.stop_tailing(id).await;
        self.store.update_chunk(&key, |chunk| chunk.check_point = Some(podlog_model::CheckPoint::new(-1, 0))).await;
        self.catch_up(files).await
    }

    async fn start_tailing(&self, file: LogFile) -> Result<(), DistributorError> {
        let id = file.id();
        let check_point = podlog_model::CheckPoint::new(-1, 0);
        let key = self.store.get_or_create_chunk(&file, Some(check_point))?;
        let offset = self.store.load_chunk(&key).await.and_then(|c| c.check_point).map(|cp| cp.offset.max(0) as u64).unwrap_or(0);

        let (tailer, log_rx) = match Tailer::spawn(file.clone(), self.format, offset, self.tailer_config.clone()) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(path = %file.path, error = %e, "failed to spawn tailer");
                return Ok(());
            }
        };
        podlog_metrics::add_tailer_started();

        let store = self.store.clone();
        let handler = self.handler.clone();
        let file_num = file.number;
        let writer = tokio::spawn(async move {
            let Some(entry) = store.chunks().get(&key.to_string()) else { return };
            let chunk_lock = entry.value();
            let limiter = store.limiter();
            if let Err(e) = write_tailed_logs(store.root(), &store.config, chunk_lock, file_num, log_rx, limiter, handler.as_deref()).await {
                tracing::debug!(stream = %key, error = %e, "tailed writer stopped");
            }
        });

        self.tailers.insert(id, RunningTailer { tailer, writer });
        Ok(())
    }

    async fn stop_tailing(&self, id: &str) {
        if let Some((_, running)) = self.tailers.remove(id) {
            running.tailer.stop().await;
            let _ = running.writer.await;
            podlog_metrics::add_tailer_stopped();
        }
    }

    async fn update_metrics(&self) {
        let store_addr = self.store.cluster();
        let chunks = self.store.snapshot_chunks().await;
        podlog_metrics::set_stored_chunks(store_addr, chunks.len() as i64);

        let mut total_blocks = 0i64;
        for chunk in &chunks {
            total_blocks += chunk.block_length() as i64;
            podlog_metrics::set_block_size(&chunk.key(), chunk.size);
        }
        podlog_metrics::set_stored_blocks(store_addr, total_blocks);

        for stat in self.store.limiter().limits() {
            podlog_metrics::set_capacity_of_limit(stat.description, stat.cap);
            podlog_metrics::set_usage_of_limit(stat.description, stat.used);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use podlog_store::StoreConfig;

    fn sample_config(root: &std::path::Path, logs_root: &std::path::Path) -> Arc<DistributorConfig> {
        Arc::new(DistributorConfig {
            stdstream_log_root_path: logs_root.display().to_string(),
            empty_dir_log_root_path: root.join("emptydir").display().to_string(),
            file_inspect_max_stale: std::time::Duration::from_secs(6 * 24 * 3600),
            // zero, so the freshly-written test file is already "stale" for
            // tailing purposes by the time this pass runs, exercising only
            // the catch-up path rather than spawning a live tailer.
            tail_file_max_stale: std::time::Duration::from_nanos(0),
            ..DistributorConfig::default()
        })
    }

    #[tokio::test]
    async fn inspect_once_catches_up_a_stale_stream_without_starting_a_tailer() {
        let store_dir = tempfile::tempdir().unwrap();
        let logs_dir = tempfile::tempdir().unwrap();

        let pod_dir = logs_dir.path().join("default_web-0_uid-1").join("app");
        std::fs::create_dir_all(&pod_dir).unwrap();
        let ts = chrono::Utc::now() - chrono::Duration::seconds(5);
        std::fs::write(
            pod_dir.join("0.log"),
            format!("{} stdout F hello\n", ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)),
        )
        .unwrap();

        let store = Arc::new(Store::open(Arc::new(StoreConfig { store_root_path: store_dir.path().display().to_string(), ..Default::default() }), "local").unwrap());
        let config = sample_config(store_dir.path(), logs_dir.path());
        let tailer_config = Arc::new(podlog_tailer::TailerConfig::default());

        let distributor = Distributor::new(store.clone(), config, tailer_config, Arc::new(crate::platform::EmptyPodProvider), LogFormat::Text, None);

        distributor.inspect_once().await.unwrap();

        let chunks = store.snapshot_chunks().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].line, 1);
        assert!(distributor.tailers.is_empty());
    }

    /// §8 scenario 3: rotation must seal the previously-active file's temp
    /// block under its own number and resume under the new one, with the
    /// two sealed blocks ordering strictly by `file_num`.
    #[tokio::test]
    async fn handle_rotation_or_truncation_seals_the_old_file_and_catches_up_the_new_one() {
        let store_dir = tempfile::tempdir().unwrap();
        let logs_dir = tempfile::tempdir().unwrap();

        let pod_dir = logs_dir.path().join("default_web-0_uid-1").join("app");
        std::fs::create_dir_all(&pod_dir).unwrap();

        let base = chrono::Utc::now() - chrono::Duration::seconds(10);
        let file0_path = pod_dir.join("0.log");
        std::fs::write(
            &file0_path,
            format!("{} stdout F first\n", base.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)),
        )
        .unwrap();

        let store = Arc::new(Store::open(Arc::new(StoreConfig { store_root_path: store_dir.path().display().to_string(), ..Default::default() }), "local").unwrap());
        let config = sample_config(store_dir.path(), logs_dir.path());
        let tailer_config = Arc::new(podlog_tailer::TailerConfig::default());
        let distributor = Distributor::new(store.clone(), config, tailer_config, Arc::new(crate::platform::EmptyPodProvider), LogFormat::Text, None);

        // Catch up 0.log first: this creates the chunk with checkpoint.file_num == 0.
        distributor.inspect_once().await.unwrap();
        let chunks = store.snapshot_chunks().await;
        assert_eq!(chunks[0].check_point.unwrap().file_num, 0);

        // 1.log rotates in; 0.log is still around (not yet GC'd by kubelet).
        let file1_path = pod_dir.join("1.log");
        std::fs::write(
            &file1_path,
            format!("{} stdout F second\n", (base + chrono::Duration::seconds(1)).to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)),
        )
        .unwrap();

        let file0 = LogFile {
            namespace: "default".into(),
            labels: podlog_model::Labels::default(),
            pod: "web-0".into(),
            pod_uid: "uid-1".into(),
            container: "app".into(),
            file_name: "0.log".into(),
            path: file0_path.display().to_string(),
            source: podlog_model::Source::std_stream(),
            number: 0,
            mod_time: chrono::Utc::now(),
            inspected_size: 0,
        };
        let file1 = LogFile {
            file_name: "1.log".into(),
            path: file1_path.display().to_string(),
            number: 1,
            ..file0.clone()
        };

        distributor
            .handle_rotation_or_truncation("default_web-0_uid-1/app", &[file0, file1])
            .await
            .unwrap();

        let chunks = store.snapshot_chunks().await;
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.check_point.unwrap().file_num, 1);
        let file_nums: Vec<i64> = chunk.blocks.iter().map(|b| b.file_num).collect();
        assert_eq!(file_nums, vec![0, 1]);
        assert_eq!(chunk.temp_block.file_num, 1);
        assert_eq!(chunk.temp_block.size, 0);
    }
}
