use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    SetName(#[from] podlog_model::set_name::SetNameError),
    #[error(transparent)]
    Read(#[from] podlog_blockreader::ReadError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("leaky bucket rejected write: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
