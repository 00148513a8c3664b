//! Thin wrappers over the process-wide `metrics` recorder, one function per
//! named metric (`add_push_error`, `set_stored_chunks`,
//! `set_capacity_of_limit`, ...). The `/metrics` HTTP exposition endpoint
//! itself is out of scope here; this
//! crate only gives call sites somewhere meaningful to report to. Without a
//! recorder installed, every call below is a documented no-op (the `metrics`
//! facade's default behavior), so binaries that don't care about exposition
//! still link and run fine.

pub fn set_stored_chunks(store_addr: &str, count: i64) {
    metrics::gauge!("podlog_stored_chunks", "store" => store_addr.to_string()).set(count as f64);
}

pub fn set_stored_blocks(store_addr: &str, count: i64) {
    metrics::gauge!("podlog_stored_blocks", "store" => store_addr.to_string()).set(count as f64);
}

pub fn set_block_size(chunk_key: &str, bytes: i64) {
    metrics::gauge!("podlog_chunk_block_bytes", "chunk" => chunk_key.to_string()).set(bytes as f64);
}

pub fn set_capacity_of_limit(tier: &str, cap: usize) {
    metrics::gauge!("podlog_limiter_capacity", "tier" => tier.to_string()).set(cap as f64);
}

pub fn set_usage_of_limit(tier: &str, used: usize) {
    metrics::gauge!("podlog_limiter_used", "tier" => tier.to_string()).set(used as f64);
}

pub fn add_push_error() {
    metrics::counter!("podlog_push_errors_total").increment(1);
}

pub fn add_push_success(chunks: usize) {
    metrics::counter!("podlog_push_chunks_total").increment(chunks as u64);
}

pub fn add_tailer_started() {
    metrics::counter!("podlog_tailers_started_total").increment(1);
}

pub fn add_tailer_stopped() {
    metrics::counter!("podlog_tailers_stopped_total").increment(1);
}

pub fn add_block_sealed(chunk_key: &str) {
    metrics::counter!("podlog_blocks_sealed_total", "chunk" => chunk_key.to_string()).increment(1);
}

pub fn add_retention_deleted_blocks(reason: &'static str, count: u64) {
    metrics::counter!("podlog_retention_deleted_blocks_total", "reason" => reason).increment(count);
}

pub fn observe_range_scan_duration(seconds: f64) {
    metrics::histogram!("podlog_range_scan_seconds").record(seconds);
}

pub fn observe_fanout_duration(stage: &'static str, seconds: f64) {
    metrics::histogram!("podlog_query_fanout_seconds", "stage" => stage).record(seconds);
}

pub fn add_export_bytes(sink_ns: &str, sink_name: &str, bytes: u64) {
    metrics::counter!("podlog_export_bytes_total", "sink_ns" => sink_ns.to_string(), "sink" => sink_name.to_string())
        .increment(bytes);
}

pub fn add_export_failure(sink_type: &'static str) {
    metrics::counter!("podlog_export_failures_total", "sink_type" => sink_type).increment(1);
}

pub fn add_http_request(route: &'static str, status: u16) {
    metrics::counter!("podlog_http_requests_total", "route" => route, "status" => status.to_string()).increment(1);
}
