use serde::{Deserialize, Serialize};

/// Which of the two supported line formats a source emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// `{RFC3339[Nano]} {stream} {tag} {message}` (CRI-style).
    Text,
    /// Docker-style JSON with `"time"` and `"log"` fields.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}
