use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podlog_model::Chunk;
use podlog_sink::types::HttpDestination;

use super::{default_file_name, UploadError, Uploader};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Multipart POST to a plain HTTP endpoint.
pub struct HttpUploader {
    client: reqwest::Client,
    dest: HttpDestination,
    interval: Duration,
}

impl HttpUploader {
    pub fn new(dest: HttpDestination, interval: Duration) -> Self {
        HttpUploader {
            client: reqwest::Client::builder().timeout(UPLOAD_TIMEOUT).build().expect("static reqwest client configuration"),
            dest,
            interval,
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    fn validate(&self) -> Result<(), UploadError> {
        if self.dest.destination.is_empty() {
            return Err(UploadError::Invalid("http destination is missing a URL".into()));
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn dir(&self, chunk: &Chunk, _date: DateTime<Utc>) -> String {
        format!("{}/{}/{}", chunk.namespace, chunk.pod, chunk.container)
    }

    fn file_name(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        default_file_name(start, end)
    }

    async fn upload(&self, data: &[u8], chunk: &Chunk, p_start: DateTime<Utc>, p_end: DateTime<Utc>) -> Result<(), UploadError> {
        let dir = self.dir(chunk, p_start);
        let file = self.file_name(p_start, p_end);
        let url = format!("{}/{}/{}", self.dest.destination.trim_end_matches('/'), dir, file);

        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(file.clone());
        let form = reqwest::multipart::Form::new().part("text", part);

        let resp = self.client.post(&url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(UploadError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_an_empty_destination_url() {
        let uploader = HttpUploader::new(HttpDestination { destination: String::new() }, Duration::from_secs(60));
        assert!(uploader.validate().is_err());
    }

    #[test]
    fn validate_accepts_a_populated_destination_url() {
        let uploader = HttpUploader::new(
            HttpDestination {
                destination: "http://sink.example".into(),
            },
            Duration::from_secs(60),
        );
        assert!(uploader.validate().is_ok());
    }
}
