use std::io;

/// Installs the process-wide `tracing` subscriber: JSON lines on stderr, UTC
/// RFC3339 timestamps, level filterable via `RUST_LOG` (defaults to `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .flatten_event(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(true)
        .init();
}

/// Extension trait for collapsing a fatal startup error into a log line plus
/// a non-zero exit, instead of an unwind through `unwrap`/`expect`.
pub trait Must<T> {
    fn or_bail(self, message: &str) -> T;
}

impl<T, E> Must<T> for Result<T, E>
where
    E: std::fmt::Display + std::fmt::Debug,
{
    fn or_bail(self, message: &str) -> T {
        match self {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(error_details = ?e, message);
                tracing::error!(error = %e, message);
                std::process::exit(1);
            }
        }
    }
}

impl<T> Must<T> for Option<T> {
    fn or_bail(self, message: &str) -> T {
        match self {
            Some(t) => t,
            None => {
                tracing::error!(message);
                std::process::exit(1);
            }
        }
    }
}
