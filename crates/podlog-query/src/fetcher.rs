//! Per-chunk fetches against the store that owns it, used by both the
//! query shard (same cluster) and the global querier (cross cluster) to
//! pull a chunk's series or raw/entry range contents.

use podlog_model::{ApiError, Entry, SeriesData};

use crate::request::Request;
use crate::response::{RangeResponseV1, RangeResponseV2, SeriesResponse};

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request to store failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store responded with status {0}")]
    Status(u16),
}

pub async fn fetch_series(client: &reqwest::Client, scheme: &str, store_addr: &str, version: &str, req: &Request) -> Result<SeriesData, FetchError> {
    let url = format!("{scheme}://{store_addr}/api/{version}/logs/series");
    let resp = client.post(&url).json(req).send().await?;
    if resp.status() == reqwest::StatusCode::NO_CONTENT {
        return Ok(SeriesData::new());
    }
    if !resp.status().is_success() {
        return Err(FetchError::Status(resp.status().as_u16()));
    }
    Ok(resp.json::<SeriesResponse>().await?.series)
}

pub enum RangeContents {
    Raw(Vec<u8>),
    Entries(Vec<Entry>),
}

pub async fn fetch_range(client: &reqwest::Client, scheme: &str, store_addr: &str, version: &str, req: &Request) -> Result<RangeContents, FetchError> {
    let url = format!("{scheme}://{store_addr}/api/{version}/logs/range");
    let resp = client.post(&url).json(req).send().await?;
    if !resp.status().is_success() {
        return Err(FetchError::Status(resp.status().as_u16()));
    }

    if req.is_v2() {
        let body = resp.json::<RangeResponseV2>().await?;
        Ok(RangeContents::Entries(body.contents))
    } else {
        let body = resp.json::<RangeResponseV1>().await?;
        Ok(RangeContents::Raw(body.contents.into_bytes()))
    }
}

impl From<FetchError> for ApiError {
    fn from(_: FetchError) -> Self {
        ApiError::Internal
    }
}
