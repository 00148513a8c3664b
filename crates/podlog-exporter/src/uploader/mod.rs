//! The uploader interface and its three destination implementations.

pub mod http;
pub mod kafka;
pub mod s3;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podlog_model::Chunk;

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("invalid uploader configuration: {0}")]
    Invalid(String),
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("destination responded with status {0}")]
    Status(u16),
    #[error("s3 upload failed: {0}")]
    S3(String),
    #[error("kafka upload failed: {0}")]
    Kafka(String),
}

/// One export destination, keyed by the rule field present on an order's
/// `Destination`.
#[async_trait]
pub trait Uploader: Send + Sync {
    fn validate(&self) -> Result<(), UploadError>;
    fn interval(&self) -> Duration;
    async fn upload(&self, data: &[u8], chunk: &Chunk, p_start: DateTime<Utc>, p_end: DateTime<Utc>) -> Result<(), UploadError>;
    fn dir(&self, chunk: &Chunk, date: DateTime<Utc>) -> String;
    fn file_name(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String;
}

/// `{start}_{end}.log` with `+` escaped as `%2B`, matching the S3 uploader's
/// optional file-name encoding, applied uniformly so every uploader
/// produces the same object-key shape.
pub fn default_file_name(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!("{}_{}.log", encode_plus(&start.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)), encode_plus(&end.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)))
}

fn encode_plus(s: &str) -> String {
    s.replace('+', "%2B")
}

/// Builds the uploader keyed by whichever rule field is present on an
/// order's `Destination`. The Kafka variant needs a
/// runtime handle for its OAUTHBEARER callback even when no SASL is
/// configured, since the producer's context type is uniform either way.
pub fn build(destination: &podlog_sink::types::Destination, sink_namespace: &str, sink_name: &str, rule_name: &str, interval: Duration, s3_client: &aws_sdk_s3::Client, kafka_handle: tokio::runtime::Handle) -> Result<Box<dyn Uploader>, UploadError> {
    use podlog_sink::types::Destination;
    let uploader: Box<dyn Uploader> = match destination {
        Destination::S3(dest) => Box::new(s3::S3Uploader::new(s3_client.clone(), dest.clone(), sink_namespace.to_string(), sink_name.to_string(), rule_name.to_string(), interval)),
        Destination::Http(dest) => Box::new(http::HttpUploader::new(dest.clone(), interval)),
        Destination::Kafka(dest) => Box::new(kafka::KafkaUploader::new(dest, interval, kafka_handle)?),
    };
    Ok(uploader)
}
