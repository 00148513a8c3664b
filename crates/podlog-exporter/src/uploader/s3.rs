use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use podlog_model::{Chunk, Source};
use podlog_sink::types::S3Destination;

use super::template::{render, PathContext};
use super::{default_file_name, UploadError, Uploader};
use crate::golayout::format_go_layout;

/// PUTs export pages to object storage. Path templates are
/// rendered per upload rather than precompiled, since `regex`'s `OnceLock`
/// cache already avoids recompiling the token pattern across calls.
pub struct S3Uploader {
    client: aws_sdk_s3::Client,
    dest: S3Destination,
    sink_namespace: String,
    sink_name: String,
    rule_name: String,
    interval: Duration,
}

impl S3Uploader {
    pub fn new(client: aws_sdk_s3::Client, dest: S3Destination, sink_namespace: String, sink_name: String, rule_name: String, interval: Duration) -> Self {
        S3Uploader {
            client,
            dest,
            sink_namespace,
            sink_name,
            rule_name,
            interval,
        }
    }

    /// Up to 10 tag key/value pairs, URL-query-encoded for S3's `Tagging`
    /// header.
    fn tagging(&self) -> Option<String> {
        if self.dest.tags.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .dest
            .tags
            .iter()
            .take(10)
            .map(|(k, v)| format!("{}={}", utf8_percent_encode(k, NON_ALPHANUMERIC), utf8_percent_encode(v, NON_ALPHANUMERIC)))
            .collect();
        Some(pairs.join("&"))
    }
}

fn source_suffix(source: &Source) -> String {
    if source.source_type == Source::STD_STREAM || source.path.is_empty() {
        String::new()
    } else {
        format!("/{}", source.path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Uploader for S3Uploader {
    fn validate(&self) -> Result<(), UploadError> {
        if self.dest.bucket_name.is_empty() {
            return Err(UploadError::Invalid("s3 destination is missing a bucket name".into()));
        }
        if !self.dest.path_template.is_empty() && !self.dest.path_template.starts_with('/') {
            return Err(UploadError::Invalid("s3 path template must be absolute".into()));
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn dir(&self, chunk: &Chunk, date: DateTime<Utc>) -> String {
        if !self.dest.path_template.is_empty() {
            let ctx = PathContext {
                chunk,
                sink_namespace: &self.sink_namespace,
                sink_name: &self.sink_name,
                rule_name: &self.rule_name,
                date,
            };
            return render(&self.dest.path_template, &ctx);
        }

        format!(
            "{}/{}/{}/{}/{}/{}/{}{}",
            self.dest.root_path.trim_end_matches('/'),
            format_go_layout("2006-01", date),
            self.sink_namespace,
            self.sink_name,
            self.rule_name,
            chunk.pod,
            chunk.container,
            source_suffix(&chunk.source),
        )
    }

    fn file_name(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        default_file_name(start, end)
    }

    async fn upload(&self, data: &[u8], chunk: &Chunk, p_start: DateTime<Utc>, p_end: DateTime<Utc>) -> Result<(), UploadError> {
        let dir = self.dir(chunk, p_start);
        let file = self.file_name(p_start, p_end);
        let key = format!("{}/{}", dir.trim_matches('/'), file);

        let mut put = self
            .client
            .put_object()
            .bucket(&self.dest.bucket_name)
            .key(&key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data.to_vec()));
        if let Some(tagging) = self.tagging() {
            put = put.tagging(tagging);
        }
        put.send().await.map_err(|e| UploadError::S3(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_dest() -> S3Destination {
        S3Destination {
            bucket_name: "bucket".into(),
            root_path: "exports".into(),
            path_template: String::new(),
            tags: Default::default(),
        }
    }

    fn sample_chunk() -> Chunk {
        Chunk {
            id: "id".into(),
            cluster: "local".into(),
            namespace: "ns".into(),
            labels: podlog_model::Labels(Default::default()),
            set_name: "web".into(),
            pod: "web-0".into(),
            pod_uid: "uid".into(),
            container: "app".into(),
            source: Source::std_stream(),
            blocks: Vec::new(),
            temp_block: Default::default(),
            started_at: Default::default(),
            updated_at: Default::default(),
            deletion_mark: false,
            deletion_mark_in_block: false,
            line: 0,
            size: 0,
            check_point: None,
            store_addr: String::new(),
            relative_pod_dir: String::new(),
            relative_block_dir: String::new(),
        }
    }

    fn uploader(dest: S3Destination) -> S3Uploader {
        let config = aws_config::SdkConfig::builder().region(aws_config::Region::new("us-east-1")).build();
        S3Uploader::new(aws_sdk_s3::Client::new(&config), dest, "ops".into(), "logs".into(), "all".into(), Duration::from_secs(60))
    }

    #[test]
    fn validate_rejects_an_empty_bucket_name() {
        let dest = S3Destination { bucket_name: String::new(), ..sample_dest() };
        assert!(uploader(dest).validate().is_err());
    }

    #[test]
    fn validate_rejects_a_relative_path_template() {
        let dest = S3Destination {
            path_template: "relative/{{.Pod}}".into(),
            ..sample_dest()
        };
        assert!(uploader(dest).validate().is_err());
    }

    #[test]
    fn dir_uses_the_default_layout_without_a_template() {
        let chunk = sample_chunk();
        let date = Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap();
        let dir = uploader(sample_dest()).dir(&chunk, date);
        assert_eq!(dir, "exports/2024-03/ops/logs/all/web-0/app");
    }

    #[test]
    fn dir_appends_the_source_path_for_non_stream_sources() {
        let mut chunk = sample_chunk();
        chunk.source = Source::emptydir_file("/var/log/app.log");
        let date = Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap();
        let dir = uploader(sample_dest()).dir(&chunk, date);
        assert_eq!(dir, "exports/2024-03/ops/logs/all/web-0/app/var/log/app.log");
    }
}
