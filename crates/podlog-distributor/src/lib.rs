//! Owns the per-node discovery-to-ingest loop: finds container
//! log files under the kubelet's on-disk layout, drives catch-up reads and
//! live tailing through [`podlog_store`], and reports what it finds to
//! [`podlog_metrics`]. The pod-metadata client itself is out of scope
//! and is represented here only as the [`platform::PodProvider`]
//! trait boundary.

pub mod config;
pub mod discovery;
pub mod distributor;
pub mod error;
pub mod platform;

pub use config::DistributorConfig;
pub use distributor::{Distributor, MatchHandler};
pub use error::DistributorError;
pub use platform::{EmptyPodProvider, PodInfo, PodProvider};
