//! The series-then-range fetch shared by the query shard (same cluster)
//! and the global querier (cross cluster): once a caller has resolved
//! the distinct `store_addr`/endpoint set a request's chunks live on,
//! these helpers issue one sub-request per address in parallel and
//! merge the results.

use podlog_logline::LogFormat;
use podlog_model::{Entry, SeriesData};
use tokio::sync::mpsc;

use crate::assemble;
use crate::fetcher::{fetch_range, fetch_series, RangeContents};
use crate::request::Request;

/// Fetches `req`'s series from every address in parallel and merges them.
pub async fn fetch_series_from_stores(client: &reqwest::Client, scheme: &str, version: &str, addrs: &[String], req: &Request) -> SeriesData {
    if addrs.is_empty() {
        return SeriesData::new();
    }

    let (tx, mut rx) = mpsc::channel(addrs.len());
    for addr in addrs {
        let client = client.clone();
        let scheme = scheme.to_string();
        let version = version.to_string();
        let addr = addr.clone();
        let req = req.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let series = fetch_series(&client, &scheme, &addr, &version, &req).await.unwrap_or_else(|e| {
                tracing::debug!(addr, error = %e, "series fetch failed");
                SeriesData::new()
            });
            let _ = tx.send(series).await;
        });
    }
    drop(tx);

    let mut parts = Vec::new();
    while let Some(part) = rx.recv().await {
        parts.push(part);
    }
    assemble::merge_series(parts)
}

pub enum MergedRange {
    Raw(Vec<u8>, bool),
    Entries(Vec<Entry>, bool),
}

/// Fetches `req`'s range contents from every address in parallel and
/// merges them, dispatching on `req.is_v2()`.
pub async fn fetch_range_from_stores(client: &reqwest::Client, scheme: &str, version: &str, addrs: &[String], req: &Request, format: LogFormat) -> MergedRange {
    let is_v2 = req.is_v2();
    let (tx, mut rx) = mpsc::channel::<Result<RangeContents, ()>>(addrs.len().max(1));
    for addr in addrs {
        let client = client.clone();
        let scheme = scheme.to_string();
        let version = version.to_string();
        let addr = addr.clone();
        let req = req.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = fetch_range(&client, &scheme, &addr, &version, &req).await.map_err(|e| {
                tracing::debug!(addr, error = %e, "range fetch failed");
            });
            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    let mut raw_parts = Vec::new();
    let mut entry_parts = Vec::new();
    while let Some(result) = rx.recv().await {
        match result {
            Ok(RangeContents::Raw(bytes)) => raw_parts.push(bytes),
            Ok(RangeContents::Entries(entries)) => entry_parts.push(entries),
            Err(()) => {}
        }
    }

    if is_v2 {
        let merged = assemble::merge_entries(entry_parts, req.contents_limit);
        MergedRange::Entries(merged.entries, merged.is_partial)
    } else {
        let merged = assemble::merge_raw(raw_parts, format, req.contents_limit);
        MergedRange::Raw(merged.contents, merged.is_partial)
    }
}
