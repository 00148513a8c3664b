use serde::{Deserialize, Serialize};

/// Joins a source type tag and its path when both must be flattened into a
/// single path segment, e.g. the on-disk `emptydir::{sanitized_path}` block
/// directory name.
pub const LOG_TYPE_DELIMITER: &str = "::";

/// Identifies the logical log stream within a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl Source {
    pub const STD_STREAM: &'static str = "std-stream";
    pub const EMPTYDIR_FILE: &'static str = "emptydir-file";

    pub fn std_stream() -> Self {
        Source {
            source_type: Self::STD_STREAM.to_string(),
            path: String::new(),
        }
    }

    pub fn emptydir_file(path: impl Into<String>) -> Self {
        Source {
            source_type: Self::EMPTYDIR_FILE.to_string(),
            path: path.into(),
        }
    }

    pub fn is_emptydir(&self) -> bool {
        self.source_type == Self::EMPTYDIR_FILE
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.source_type)
        } else {
            write!(f, "{}{}{}", self.source_type, LOG_TYPE_DELIMITER, self.path)
        }
    }
}
