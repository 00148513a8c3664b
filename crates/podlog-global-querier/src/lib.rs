//! The global querier: fans list/series/range requests out across a
//! static, startup-resolved cluster table instead of a single cluster's
//! query shards. Every request must name at least one namespace; no
//! whole-fleet scans.

pub mod config;
pub mod http;
pub mod service;

pub use config::{ClusterEndpoint, GlobalQuerierConfig};
pub use service::GlobalQuerierService;
