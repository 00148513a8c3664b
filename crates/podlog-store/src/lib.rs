//! The per-node store: owns the on-disk block layout under
//! one node's store root, the in-memory chunk index reconstructed from it
//! at startup, the write paths that grow that index from tailed and
//! catch-up reads, the retention passes that shrink it back down, and the
//! local read path the query tier calls into.

pub mod config;
pub mod disk;
pub mod error;
pub mod http;
pub mod init;
pub mod key;
pub mod layout;
pub mod ratelimit;
pub mod read;
pub mod retention;
pub mod store;
pub mod write;

pub use config::StoreConfig;
pub use error::StoreError;
pub use key::ChunkKey;
pub use store::Store;
