//! The sink manager + syncer: operator-defined `Sink`
//! objects become per-namespace `Preorder`s (syncer), which the exporter's
//! `Manager` matches against its current chunks to produce `Order`s.

pub mod manager;
pub mod syncer;
pub mod types;

pub use manager::{Manager, ManagerConfig};
pub use syncer::{Syncer, SyncerConfig};
pub use types::{Destination, HttpDestination, KafkaDestination, KafkaSasl, Order, Preorder, Rule, S3Destination, Sink};
