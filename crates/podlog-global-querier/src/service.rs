//! Identical in shape to the query shard's broker path but with one entry
//! per cluster. No local index of its own — every request is answered
//! purely by fanning out to the resolved cluster table and re-running the
//! series-then-range two-phase fetch against whatever `store_addr`s the
//! cluster-scoped chunk listing returns.

use podlog_logline::LogFormat;
use podlog_model::{ApiError, Entry, PageInfo};
use podlog_query::{Endpoint, MergedRange, Request};
use std::collections::HashSet;

pub enum RangeResult {
    Raw(Vec<u8>, PageInfo),
    Entries(Vec<Entry>, PageInfo),
}

pub struct GlobalQuerierService {
    endpoints: Vec<Endpoint>,
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

fn store_addrs_of(chunks: &[podlog_model::Chunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks.iter().map(|c| c.store_addr.clone()).filter(|a| !a.is_empty() && seen.insert(a.clone())).collect()
}

impl GlobalQuerierService {
    pub fn new(endpoints: Vec<Endpoint>, client: reqwest::Client, scheme: impl Into<String>, format: LogFormat, page_burst: i64) -> Self {
        GlobalQuerierService {
            endpoints,
            client,
            scheme: scheme.into(),
            format,
            page_burst,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Validates that every request specifies at least one namespace.
    fn validate(req: &Request) -> Result<(), ApiError> {
        if req.namespaces.is_empty() {
            return Err(ApiError::BadRequest);
        }
        Ok(())
    }

    pub async fn get_chunks_within_range(&self, req: &Request) -> Result<Vec<podlog_model::Chunk>, ApiError> {
        Self::validate(req)?;
        Ok(podlog_query::fan_out_chunks(&self.client, &self.scheme, effective_version(req), &self.endpoints, req, true).await)
    }

    pub async fn get_series_in_blocks_within_range(&self, req: &Request) -> Result<podlog_model::SeriesData, ApiError> {
        let chunks = self.get_chunks_within_range(req).await?;
        let addrs = store_addrs_of(&chunks);
        Ok(podlog_query::fetch_series_from_stores(&self.client, &self.scheme, effective_version(req), &addrs, req).await)
    }

    #[cfg(test)]
    pub(crate) fn validate_for_test(req: &Request) -> Result<(), ApiError> {
        Self::validate(req)
    }

    pub async fn get_range_within_range(&self, req: &Request) -> Result<RangeResult, ApiError> {
        let series = self.get_series_in_blocks_within_range(req).await?;
        let (sub_req, mut page_info) = podlog_query::make_sub_query(req, &series, self.page_burst)?;

        let chunks = self.get_chunks_within_range(&sub_req).await?;
        let addrs = store_addrs_of(&chunks);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_a_request_with_no_namespaces() {
        let req = Request::default();
        assert_eq!(GlobalQuerierService::validate_for_test(&req), Err(ApiError::BadRequest));
    }

    #[test]
    fn validate_accepts_a_request_naming_a_namespace() {
        let req = Request {
            namespaces: vec!["ns-a".to_string()],
            ..Default::default()
        };
        assert_eq!(GlobalQuerierService::validate_for_test(&req), Ok(()));
    }

    #[tokio::test]
    async fn get_chunks_within_range_rejects_before_fanning_out() {
        let service = GlobalQuerierService::new(Vec::new(), reqwest::Client::new(), "http", LogFormat::Text, 1000);
        let req = Request::default();
        assert!(matches!(service.get_chunks_within_range(&req).await, Err(ApiError::BadRequest)));
    }
}
