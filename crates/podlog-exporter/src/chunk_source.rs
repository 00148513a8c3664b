//! Talks to the local store's HTTP API to re-ingest its current chunks and
//! fetch export page bytes, redesigned from a `ChunkService` gRPC surface
//! onto the store's existing `/api/v1/logs{,/range}` HTTP endpoints, which
//! already carry everything the exporter needs and avoid standing up a
//! second wire protocol for one caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use podlog_model::{Chunk, PageInfo};
use podlog_query::Request;

#[derive(thiserror::Error, Debug)]
pub enum ChunkSourceError {
    #[error("request to local store failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("local store responded with status {0}")]
    Status(u16),
}

pub struct ChunkSource {
    client: reqwest::Client,
    scheme: String,
    store_addr: String,
}

impl ChunkSource {
    pub fn new(client: reqwest::Client, scheme: impl Into<String>, store_addr: impl Into<String>) -> Self {
        ChunkSource {
            client,
            scheme: scheme.into(),
            store_addr: store_addr.into(),
        }
    }

    /// Every chunk the local store currently holds that overlaps
    /// `[start, end]`; re-ingested wholesale into a fresh per-tick cache so
    /// the exporter's view always matches the store's.
    pub async fn chunks_within_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Chunk>, ChunkSourceError> {
        let req = Request {
            start,
            end,
            ..Default::default()
        };
        let url = format!("{}://{}/api/v1/logs", self.scheme, self.store_addr);
        let resp = self.client.post(&url).json(&req).send().await?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(ChunkSourceError::Status(resp.status().as_u16()));
        }
        Ok(resp.json::<Vec<Chunk>>().await?)
    }

    /// One page's raw bytes for a narrowed selector; the exporter drives
    /// `req.page`/`req.burst` across calls to paginate a chunk, continuing
    /// while the returned `PageInfo::has_next` says more remain.
    pub async fn range(&self, req: &Request) -> Result<(Vec<u8>, PageInfo), ChunkSourceError> {
        let url = format!("{}://{}/api/v1/logs/range", self.scheme, self.store_addr);
        let resp = self.client.post(&url).json(req).send().await?;
        if !resp.status().is_success() {
            return Err(ChunkSourceError::Status(resp.status().as_u16()));
        }
        let body: podlog_query::RangeResponseV1 = resp.json().await?;
        Ok((body.contents.into_bytes(), body.page_info))
    }
}

/// Re-keys a freshly-fetched chunk list by [`Chunk::key`] for the order
/// loop's "fetch the latest chunk state" lookup; a miss
/// means the chunk was deleted or rotated out since `Manager::update` last
/// saw it, and the order is skipped for this tick.
pub fn index_by_key(chunks: Vec<Chunk>) -> HashMap<String, Chunk> {
    chunks.into_iter().map(|c| (c.key(), c)).collect()
}
