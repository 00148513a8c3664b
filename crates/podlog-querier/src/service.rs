//! The query shard's core request handling: local matching against the
//! chunk index, peer fan-out, and the two-phase series-then-range fetch
//! against each matched chunk's owning store.

use std::collections::HashSet;
use std::sync::Arc;

use podlog_logline::LogFormat;
use podlog_model::{ApiError, Entry, PageInfo};
use podlog_query::{Endpoint, MergedRange, Request};

use crate::index::ChunkIndex;

pub enum RangeResult {
    Raw(Vec<u8>, PageInfo),
    Entries(Vec<Entry>, PageInfo),
}

pub struct QuerierService {
    index: Arc<ChunkIndex>,
    client: reqwest::Client,
    scheme: String,
    format: LogFormat,
    page_burst: i64,
}

fn effective_version(req: &Request) -> &str {
    if req.version.is_empty() {
        "v1"
    } else {
        &req.version
    }
}

impl QuerierService {
    pub fn new(index: Arc<ChunkIndex>, scheme: impl Into<String>, format: LogFormat, page_burst: i64) -> Self {
        QuerierService {
            index,
            client: reqwest::Client::new(),
            scheme: scheme.into(),
            format,
            page_burst,
        }
    }

    pub fn index(&self) -> &Arc<ChunkIndex> {
        &self.index
    }

    fn local_match(&self, req: &Request) -> Vec<podlog_model::Chunk> {
        let matcher = podlog_query::ChunkMatcher::new(req);
        self.index.within_range(req.start, req.end).into_iter().filter(|c| matcher.matches(c)).collect()
    }

    /// Local match, plus (unless
    /// `req.local`) a fan-out to every peer shard.
    pub async fn get_chunks_within_range(&self, req: &Request, peers: &[Endpoint]) -> Vec<podlog_model::Chunk> {
        let mut out = self.local_match(req);
        if !req.local && !peers.is_empty() {
            let remote = podlog_query::fan_out_chunks(&self.client, &self.scheme, effective_version(req), peers, req, false).await;
            out.extend(remote);
        }

        let mut seen = HashSet::with_capacity(out.len());
        out.retain(|c| seen.insert(c.id.clone()));
        out
    }

    fn store_addrs_of(chunks: &[podlog_model::Chunk]) -> Vec<String> {
        let mut seen = HashSet::new();
        chunks.iter().map(|c| c.store_addr.clone()).filter(|a| !a.is_empty() && seen.insert(a.clone())).collect()
    }

    /// Lists matching chunks, then
    /// fetch one series sub-request per distinct owning store in parallel.
    pub async fn get_series_in_blocks_within_range(&self, req: &Request, peers: &[Endpoint]) -> Result<podlog_model::SeriesData, ApiError> {
        let chunks = self.get_chunks_within_range(req, peers).await;
        let addrs = Self::store_addrs_of(&chunks);
        Ok(podlog_query::fetch_series_from_stores(&self.client, &self.scheme, effective_version(req), &addrs, req).await)
    }

    /// Two-phase range fetch. Builds the sub-query from
    /// the merged series, re-lists chunks covering the narrowed window, and
    /// fetches/merges raw bytes (v1) or entries (v2) from each owning
    /// store.
    pub async fn get_range_within_range(&self, req: &Request, peers: &[Endpoint]) -> Result<RangeResult, ApiError> {
        let series = self.get_series_in_blocks_within_range(req, peers).await?;
        let (sub_req, mut page_info) = podlog_query::make_sub_query(req, &series, self.page_burst)?;

        let chunks = self.get_chunks_within_range(&sub_req, peers).await;
        let addrs = Self::store_addrs_of(&chunks);
        let version = effective_version(&sub_req).to_string();

        match podlog_query::fetch_range_from_stores(&self.client, &self.scheme, &version, &addrs, &sub_req, self.format).await {
            MergedRange::Entries(entries, is_partial) => {
                page_info.is_partial_contents = is_partial;
                Ok(RangeResult::Entries(entries, page_info))
            }
            MergedRange::Raw(bytes, is_partial) => {
                page_info.is_partial_contents = is_partial;
                Ok(RangeResult::Raw(bytes, page_info))
            }
        }
    }
}
