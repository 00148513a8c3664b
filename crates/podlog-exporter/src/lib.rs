//! Sink exporter: a periodic loop that drives receipt-tracked,
//! at-least-once export of matched chunk ranges to external destinations.

pub mod chunk_source;
pub mod config;
pub mod exporter;
pub mod golayout;
pub mod receipt;
pub mod uploader;

pub use chunk_source::ChunkSource;
pub use config::{ExporterConfig, ExporterDaemonConfig};
pub use exporter::Exporter;
pub use receipt::{Receipt, ReceiptStore};
