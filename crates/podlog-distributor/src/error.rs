#[derive(thiserror::Error, Debug)]
pub enum DistributorError {
    #[error(transparent)]
    Store(#[from] podlog_store::StoreError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DistributorError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        DistributorError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
