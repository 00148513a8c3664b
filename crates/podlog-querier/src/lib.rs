//! The query shard: an in-memory chunk database populated by push from
//! stores, answering list/series/range queries either from its own index
//! or fanned out to peer shards, and serving as the per-chunk fetch
//! target for the entry/series builder.

pub mod config;
pub mod http;
pub mod index;
pub mod push;
pub mod service;
pub mod status;

pub use config::QuerierConfig;
pub use index::ChunkIndex;
pub use push::{spawn_receiver, PushSender};
pub use service::{QuerierService, RangeResult};
