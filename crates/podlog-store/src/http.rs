//! The store's HTTP API: `/api/{v1,v2}/logs{,/series,/range}`.
//! Framing itself (axum, its middleware) is an out-of-scope collaborator;
//! this module is just the routes and handlers the core logic above is
//! fronted by.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use podlog_blockreader::BufferPool;
use podlog_logline::LogFormat;
use podlog_model::{ApiError, PageInfo};
use podlog_query::{RangeResponseV1, RangeResponseV2, Request, SeriesResponse};
use tower_http::trace::TraceLayer;

use crate::ratelimit::RangeRateLimiter;
use crate::read;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub format: LogFormat,
    pub pool: Arc<BufferPool>,
    pub range_limiter: Arc<RangeRateLimiter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/:version/logs", post(list_logs))
        .route("/api/:version/logs/series", post(series))
        .route("/api/:version/logs/range", post(range))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

struct ApiErrorResponse(ApiError);

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.0.to_string()).into_response()
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(e: ApiError) -> Self {
        ApiErrorResponse(e)
    }
}

fn check_version(version: &str) -> Result<(), ApiErrorResponse> {
    match version {
        "v1" | "v2" => Ok(()),
        _ => Err(ApiError::NotImplemented.into()),
    }
}

async fn list_logs(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;
    let chunks = read::matching_chunks(state.store.chunks(), &req).await;
    podlog_metrics::add_http_request("logs", if chunks.is_empty() { 204 } else { 200 });
    if chunks.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(chunks).into_response())
}

async fn series(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;
    let series = read::series_within_range(state.store.chunks(), state.store.root(), &req, state.format, &state.pool)
        .await
        .map_err(ApiErrorResponse)?;
    podlog_metrics::add_http_request("logs/series", 200);
    Ok(Json(SeriesResponse { series }).into_response())
}

async fn range(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;

    let Some(_guard) = state.range_limiter.try_acquire() else {
        podlog_metrics::add_http_request("logs/range", 429);
        return Ok(StatusCode::TOO_MANY_REQUESTS.into_response());
    };

    let burst = req.effective_burst(state.store.config.request_max_burst);

    if version == "v2" {
        let entries = read::entries_within_range(state.store.chunks(), state.store.root(), &req, state.format, &state.pool)
            .await
            .map_err(ApiErrorResponse)?;
        let lines = entries.len() as i64;
        let page_info = PageInfo::new(req.page.max(1), lines, burst, false);
        podlog_metrics::add_http_request("logs/range", 200);
        return Ok(Json(RangeResponseV2 { contents: entries, page_info }).into_response());
    }

    let (bytes, buckets) = read::range_within_range(state.store.chunks(), state.store.root(), &req, state.format, &state.pool)
        .await
        .map_err(ApiErrorResponse)?;
    let lines: i64 = buckets.iter().map(|b| b.lines).sum();
    let page_info = PageInfo::new(req.page.max(1), lines, burst, false);
    podlog_metrics::add_http_request("logs/range", 200);
    Ok(Json(RangeResponseV1 {
        contents: String::from_utf8_lossy(&bytes).into_owned(),
        page_info,
    })
    .into_response())
}

/// Default cool-down the range rate limiter holds a slot for after
/// release, before the next request may reuse it.
pub fn default_range_cooldown() -> Duration {
    Duration::from_secs(1)
}
