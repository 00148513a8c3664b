//! The store's half of the read path: selects which chunks
//! a request's selector/time-range covers, then hands each one to
//! [`podlog_blockreader::read_range`] and assembles the results back
//! together. Fronted over HTTP by the distributor's own local endpoints and
//! by the query shard when it has no network hop to make.

use std::path::Path;

use dashmap::DashMap;
use podlog_blockreader::BufferPool;
use podlog_filter::{Filterer, NegativeRegexpFilterer, RangeFilter, RegexpFilterer};
use podlog_logline::LogFormat;
use podlog_model::{ApiError, Bucket, Chunk, SeriesData};
use podlog_query::{ChunkMatcher, Request};
use tokio::sync::RwLock;

/// Every stored chunk whose coverage overlaps `req`'s time range and whose
/// selectors match, cloned out from under their locks so the scan itself
/// can run lock-free.
pub async fn matching_chunks(chunks: &DashMap<String, RwLock<Chunk>>, req: &Request) -> Vec<Chunk> {
    let matcher = ChunkMatcher::new(req);
    let mut out = Vec::new();
    for entry in chunks.iter() {
        let chunk = entry.value().read().await;
        if chunk.updated_at < req.start || chunk.started_at > req.end {
            continue;
        }
        if matcher.matches(&chunk) {
            out.push(chunk.clone());
        }
    }
    out
}

fn build_filters(req: &Request) -> Result<(RangeFilter, Option<RegexpFilterer>, Option<NegativeRegexpFilterer>), ApiError> {
    let range = RangeFilter::new(req.start, req.end);
    let include = if req.include_regex.is_empty() {
        None
    } else {
        Some(RegexpFilterer::new(&req.include_regex).map_err(|_| ApiError::BadRequest)?)
    };
    let exclude = if req.exclude_regex.is_empty() {
        None
    } else {
        Some(NegativeRegexpFilterer::new(&req.exclude_regex).map_err(|_| ApiError::BadRequest)?)
    };
    Ok((range, include, exclude))
}

/// Aggregated one-second buckets for every chunk matching `req`, converted
/// into named series; used by `/logs/series`.
pub async fn series_within_range(
    chunks: &DashMap<String, RwLock<Chunk>>,
    store_root: &Path,
    req: &Request,
    format: LogFormat,
    pool: &BufferPool,
) -> Result<SeriesData, ApiError> {
    let (_, buckets) = scan(chunks, store_root, req, format, true, pool).await?;
    Ok(podlog_model::series::buckets_to_series(&buckets))
}

/// Raw matching lines (concatenated) plus the buckets accumulated along the
/// way, for every chunk matching `req`; used by the v1 `/logs/range` API.
pub async fn range_within_range(
    chunks: &DashMap<String, RwLock<Chunk>>,
    store_root: &Path,
    req: &Request,
    format: LogFormat,
    pool: &BufferPool,
) -> Result<(Vec<u8>, Vec<Bucket>), ApiError> {
    scan(chunks, store_root, req, format, false, pool).await
}

/// Parsed [`podlog_model::Entry`] values for every chunk matching `req`,
/// used by the v2 `/logs/range` API. Scanned per chunk (rather than reusing
/// `range_within_range`'s single concatenated byte buffer) because entry
/// parsing needs each line's owning chunk to attach `pod`/`container`/
/// `labels`; the merged result is sorted ascending by timestamp.
pub async fn entries_within_range(
    chunks: &DashMap<String, RwLock<Chunk>>,
    store_root: &Path,
    req: &Request,
    format: LogFormat,
    pool: &BufferPool,
) -> Result<Vec<podlog_model::Entry>, ApiError> {
    let candidates = matching_chunks(chunks, req).await;
    let (range, include, exclude) = build_filters(req)?;

    let mut filterers: Vec<&dyn Filterer> = vec![&range];
    if let Some(f) = include.as_ref() {
        filterers.push(f);
    }
    if let Some(f) = exclude.as_ref() {
        filterers.push(f);
    }

    let mut entries = Vec::new();
    for chunk in &candidates {
        let (bytes, _) = podlog_blockreader::read_range(chunk, store_root, format, false, req.start, req.end, &filterers, pool).map_err(|_| ApiError::Internal)?;
        entries.extend(podlog_query::parse_entries_from_raw(&bytes, chunk, format));
    }
    entries.sort_by_key(|e| e.timestamp);
    Ok(entries)
}

async fn scan(
    chunks: &DashMap<String, RwLock<Chunk>>,
    store_root: &Path,
    req: &Request,
    format: LogFormat,
    only_series: bool,
    pool: &BufferPool,
) -> Result<(Vec<u8>, Vec<Bucket>), ApiError> {
    let candidates = matching_chunks(chunks, req).await;
    let (range, include, exclude) = build_filters(req)?;

    let mut filterers: Vec<&dyn Filterer> = vec![&range];
    if let Some(f) = include.as_ref() {
        filterers.push(f);
    }
    if let Some(f) = exclude.as_ref() {
        filterers.push(f);
    }

    let mut bytes = Vec::new();
    let mut buckets = Vec::new();
    for chunk in &candidates {
        let (chunk_bytes, chunk_buckets) = podlog_blockreader::read_range(chunk, store_root, format, only_series, req.start, req.end, &filterers, pool)
            .map_err(|_| ApiError::Internal)?;
        bytes.extend(chunk_bytes);
        buckets.extend(chunk_buckets);
    }

    Ok((bytes, buckets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Labels, LogFile, Source};

    fn make_chunk(namespace: &str, container: &str) -> Chunk {
        let file = LogFile {
            namespace: namespace.to_string(),
            labels: Labels::default(),
            pod: "web-0".into(),
            pod_uid: "uid-1".into(),
            container: container.to_string(),
            file_name: "0.log".into(),
            path: "unused".into(),
            source: Source::std_stream(),
            number: 0,
            mod_time: chrono::Utc::now(),
            inspected_size: 0,
        };
        let mut chunk = Chunk::new(&file, None, "local").unwrap();
        chunk.append_blocks(vec![podlog_model::Block::new(
            chrono::Utc::now() - chrono::Duration::seconds(10),
            chrono::Utc::now() - chrono::Duration::seconds(1),
            10,
            100,
            0,
        )]);
        chunk
    }

    #[tokio::test]
    async fn matching_chunks_filters_by_namespace_and_time_overlap() {
        let map = DashMap::new();
        let a = make_chunk("ns-a", "app");
        let b = make_chunk("ns-b", "app");
        map.insert("a".to_string(), RwLock::new(a));
        map.insert("b".to_string(), RwLock::new(b));

        let req = Request {
            namespaces: vec!["ns-a".to_string()],
            start: chrono::Utc::now() - chrono::Duration::minutes(1),
            end: chrono::Utc::now(),
            ..Default::default()
        };

        let matched = matching_chunks(&map, &req).await;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].namespace, "ns-a");
    }

    #[tokio::test]
    async fn matching_chunks_excludes_chunks_outside_the_time_range() {
        let map = DashMap::new();
        let chunk = make_chunk("ns-a", "app");
        map.insert("a".to_string(), RwLock::new(chunk));

        let req = Request {
            start: chrono::Utc::now() + chrono::Duration::hours(1),
            end: chrono::Utc::now() + chrono::Duration::hours(2),
            ..Default::default()
        };

        assert!(matching_chunks(&map, &req).await.is_empty());
    }
}
