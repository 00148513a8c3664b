//! Shared helpers for loading a subsystem's config once at startup.
//!
//! Every binary owns exactly one `schemars::JsonSchema` + `serde` config
//! struct, deserialized from a file named on the command line (optionally
//! overridden by environment variables via `clap`'s `env` feature on the
//! wrapping CLI struct). Nothing here reaches into global/static state: the
//! resulting value is wrapped in an `Arc` by the caller and threaded through
//! constructors.

use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_json<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path_display = path.as_ref().display().to_string();
    let data = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}
