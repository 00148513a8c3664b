pub mod config;
pub mod follow;
pub mod line;
pub mod state;
pub mod tailer;

pub use config::TailerConfig;
pub use line::{LogLine, TailError};
pub use state::{Phase, StopState};
pub use tailer::{SpawnError, Tailer};
