//! The sink exporter loop: once per `inspect_interval`, re-sync
//! the manager's orders against the local store's current chunks and drive
//! each due order's paginated export.

use chrono::{DateTime, DurationRound, Utc};
use podlog_logline::LogFormat;
use podlog_model::Chunk;
use podlog_query::{pin_page_bounds, Request};
use podlog_sink::Manager;

use crate::chunk_source::{index_by_key, ChunkSource};
use crate::config::ExporterConfig;
use crate::receipt::ReceiptStore;
use crate::uploader::{self, UploadError};

pub struct Exporter {
    config: ExporterConfig,
    manager: Manager,
    chunk_source: ChunkSource,
    receipts: ReceiptStore,
    s3_client: aws_sdk_s3::Client,
    format: LogFormat,
}

impl Exporter {
    pub fn new(config: ExporterConfig, manager: Manager, chunk_source: ChunkSource, receipts: ReceiptStore, s3_client: aws_sdk_s3::Client, format: LogFormat) -> Self {
        Exporter {
            config,
            manager,
            chunk_source,
            receipts,
            s3_client,
            format,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.inspect_interval);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    pub async fn tick(&self) {
        let current = Utc::now().duration_trunc(chrono::Duration::seconds(1)).unwrap_or_else(|_| Utc::now());
        let lookback = chrono::Duration::from_std(self.config.max_lookback).unwrap_or_default();
        let window_start = current - lookback;

        let chunks = match self.chunk_source.chunks_within_range(window_start, current).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, "failed to re-ingest chunks from the local store");
                return;
            }
        };
        let latest = index_by_key(chunks.clone());

        // The exporter re-ingests chunks straight from the local store, which
        // already drops a chunk once its pod's retention is swept; it has no
        // separate live-pod map to filter against here.
        let order_count = self.manager.update(&chunks, None, window_start, current).await;
        tracing::debug!(order_count, "sink manager orders refreshed");

        for entry in self.manager.orders().iter() {
            for order in entry.value() {
                let Some(chunk) = latest.get(&order.chunk_key) else {
                    continue;
                };

                let kafka_handle = tokio::runtime::Handle::current();
                let built = uploader::build(&order.preorder.destination, &order.preorder.sink_namespace, &order.preorder.sink_name, &order.preorder.rule_name, order.preorder.interval, &self.s3_client, kafka_handle);
                let uploader = match built {
                    Ok(u) => u,
                    Err(e) => {
                        tracing::warn!(error = %e, order = %order.chunk_key, "failed to build uploader");
                        podlog_metrics::add_export_failure(destination_kind(&order.preorder.destination));
                        continue;
                    }
                };
                if let Err(e) = uploader.validate() {
                    tracing::warn!(error = %e, order = %order.chunk_key, "uploader configuration invalid");
                    podlog_metrics::add_export_failure(destination_kind(&order.preorder.destination));
                    continue;
                }

                match self.export_one(chunk, uploader.as_ref(), current, window_start).await {
                    Ok(bytes) if bytes > 0 => {
                        podlog_metrics::add_export_bytes(&order.preorder.sink_namespace, &order.preorder.sink_name, bytes as u64);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, order = %order.chunk_key, "export failed");
                        podlog_metrics::add_export_failure(destination_kind(&order.preorder.destination));
                    }
                }
            }
        }

        let max_age = lookback.max(chrono::Duration::hours(1));
        match self.receipts.prune_stale(current, max_age) {
            Ok(pruned) if pruned > 0 => tracing::debug!(pruned, "pruned stale export receipts"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to prune export receipts"),
        }
    }

    async fn export_one(&self, chunk: &Chunk, uploader: &dyn uploader::Uploader, current: DateTime<Utc>, window_start: DateTime<Utc>) -> Result<i64, UploadError> {
        let key = chunk.key();
        let interval = uploader.interval();

        let mut receipt = self.receipts.load_or_create(&key, current, interval).map_err(|e| UploadError::Invalid(e.to_string()))?;
        self.receipts.store(&key, &receipt).map_err(|e| UploadError::Invalid(e.to_string()))?;

        if !receipt.due(current, interval) {
            return Ok(0);
        }

        let start = receipt.next_start().max(window_start);
        let end = current;
        if start >= end {
            return Ok(0);
        }

        let mut req = Request {
            namespaces: vec![chunk.namespace.clone()],
            pods: vec![chunk.pod.clone()],
            containers: vec![chunk.container.clone()],
            sources: vec![chunk.source.clone()],
            start,
            end,
            burst: self.config.page_burst,
            page: 1,
            ..Default::default()
        };

        let mut total_bytes: i64 = 0;
        let mut last_page_end = receipt.log_time;
        loop {
            let (raw, page_info) = self.chunk_source.range(&req).await.map_err(|e| UploadError::Invalid(e.to_string()))?;
            if raw.is_empty() {
                break;
            }

            let (p_start, p_end) = pin_page_bounds(&raw, self.format, current);
            uploader.upload(&raw, chunk, p_start, p_end).await?;

            total_bytes += raw.len() as i64;
            last_page_end = p_end;

            if !page_info.has_next {
                break;
            }
            req.page += 1;
        }

        if total_bytes > 0 {
            receipt.record(total_bytes, current, last_page_end);
            self.receipts.store(&key, &receipt).map_err(|e| UploadError::Invalid(e.to_string()))?;
        }
        Ok(total_bytes)
    }
}

fn destination_kind(destination: &podlog_sink::types::Destination) -> &'static str {
    use podlog_sink::types::Destination;
    match destination {
        Destination::S3(_) => "s3",
        Destination::Http(_) => "http",
        Destination::Kafka(_) => "kafka",
    }
}
