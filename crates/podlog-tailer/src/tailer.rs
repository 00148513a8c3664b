use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use podlog_logline::LogFormat;
use podlog_model::{LogFile, Source};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::TailerConfig;
use crate::follow::Follower;
use crate::line::{LogLine, TailError};
use crate::state::{Phase, StopState};

#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Running,
    Idle,
}

/// Tails one rotation-generation of a container log file, forwarding
/// parsed lines to a channel until stopped or the underlying file becomes
/// permanently unavailable.
pub struct Tailer {
    state: StopState,
    handle: JoinHandle<()>,
    file: LogFile,
}

impl Tailer {
    pub fn spawn(
        file: LogFile,
        format: LogFormat,
        offset: u64,
        config: Arc<TailerConfig>,
    ) -> Result<(Self, mpsc::Receiver<LogLine>), SpawnError> {
        let path = PathBuf::from(&file.path);
        Follower::open(&path, offset).map_err(|source| SpawnError::Open {
            path: file.path.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel(256);
        let state = StopState::new();
        let loop_state = state.clone();
        let source_type = file.source.source_type.clone();

        let handle = tokio::spawn(async move {
            run(path, format, source_type, offset, config, tx, loop_state).await;
        });

        Ok((Tailer { state, handle, file }, rx))
    }

    pub fn file(&self) -> &LogFile {
        &self.file
    }

    /// Requests the tailer stop, and waits until every line already handed
    /// off to the channel has been fully sent before returning.
    pub async fn stop(&self) {
        self.state.stop_and_drain().await;
        let _ = tokio::time::timeout(Duration::from_secs(5), async {
            while !self.handle.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await;
    }

    pub fn is_stopped(&self) -> bool {
        self.state.phase() == Phase::Stopped
    }
}

async fn run(
    path: PathBuf,
    format: LogFormat,
    source_type: String,
    offset: u64,
    config: Arc<TailerConfig>,
    tx: mpsc::Sender<LogLine>,
    state: StopState,
) {
    let mut follower = match Follower::open(&path, offset) {
        Ok(f) => f,
        Err(e) => {
            send_line(&tx, &state, LogLine::err(TailError::Io(e.to_string()))).await;
            return;
        }
    };

    let mut prev_ts: Option<DateTime<Utc>> = None;
    let mut status = Status::Running;
    let mut watch_rx = spawn_watcher(path.clone());
    let mut idle_ticker = tokio::time::interval(config.idle_tick);
    let mut poll_ticker = tokio::time::interval(Duration::from_millis(300));

    if !drain_ready(&mut follower, &path, &format, &source_type, &mut prev_ts, &config, &tx, &state).await {
        return;
    }

    loop {
        if state.phase() != Phase::Running {
            return;
        }

        tokio::select! {
            _ = watch_rx.recv() => {}
            _ = poll_ticker.tick() => {}
            _ = idle_ticker.tick() => {
                if status == Status::Idle {
                    return;
                }
                status = Status::Idle;
                continue;
            }
        }

        if !drain_ready(&mut follower, &path, &format, &source_type, &mut prev_ts, &config, &tx, &state).await {
            return;
        }
        status = Status::Running;

        if follower.was_rotated(&path) {
            tokio::time::sleep(config.wait_time_after_rotation).await;
            match Follower::open(&path, 0) {
                Ok(next) => follower = next,
                Err(_) => {
                    send_line(&tx, &state, LogLine::err(TailError::Unavailable)).await;
                    return;
                }
            }
        }
    }
}

/// Reads and forwards every line currently available. Returns `false` if
/// the tailer should stop entirely (terminal error, or a stop was already
/// in progress).
async fn drain_ready(
    follower: &mut Follower,
    path: &Path,
    format: &LogFormat,
    source_type: &str,
    prev_ts: &mut Option<DateTime<Utc>>,
    config: &TailerConfig,
    tx: &mpsc::Sender<LogLine>,
    state: &StopState,
) -> bool {
    let lines = match follower.read_available() {
        Ok(lines) => lines,
        Err(e) => {
            send_line(tx, state, LogLine::err(TailError::Io(e.to_string()))).await;
            return false;
        }
    };

    for raw in lines {
        let message = podlog_logline::parse_log_message_by_source(source_type, *format, &raw).unwrap_or(raw.clone());

        let ts = match podlog_logline::parse_timestamp(*format, &raw) {
            Ok(ts) => {
                *prev_ts = Some(ts);
                ts
            }
            Err(_) => {
                if source_type == Source::STD_STREAM || prev_ts.is_none() {
                    tracing::trace!(path = %path.display(), "skipping line with unparseable timestamp");
                    continue;
                }
                let ts = prev_ts.unwrap();
                let line = podlog_logline::make_unreliable_timestamp(ts, &message);
                let offset = match follower.offset() {
                    Ok(o) => o,
                    Err(e) => {
                        send_line(tx, state, LogLine::err(TailError::Io(e.to_string()))).await;
                        return false;
                    }
                };
                if !send_line(tx, state, LogLine::ok(ts, line, offset)).await {
                    return false;
                }
                continue;
            }
        };

        if Utc::now() - ts > chrono::Duration::from_std(config.min_stale_time).unwrap_or_default() {
            continue;
        }

        let offset = match follower.offset() {
            Ok(o) => o,
            Err(e) => {
                send_line(tx, state, LogLine::err(TailError::Io(e.to_string()))).await;
                return false;
            }
        };

        if !send_line(tx, state, LogLine::ok(ts, message, offset)).await {
            return false;
        }
    }

    true
}

async fn send_line(tx: &mpsc::Sender<LogLine>, state: &StopState, line: LogLine) -> bool {
    match state.begin_send() {
        Some(_guard) => tx.send(line).await.is_ok(),
        None => false,
    }
}

/// Bridges `notify`'s callback-based watcher onto a tokio channel by
/// running the (blocking) watcher on its own OS thread.
fn spawn_watcher(path: PathBuf) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        use notify::Watcher;

        let (std_tx, std_rx) = std::sync::mpsc::channel();
        let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = std_tx.send(res);
        }) {
            Ok(w) => w,
            Err(_) => return,
        };

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        if watcher.watch(parent, notify::RecursiveMode::NonRecursive).is_err() {
            return;
        }

        for res in std_rx {
            if res.is_ok() && tx.blocking_send(()).is_err() {
                break;
            }
        }
    });
    rx
}
