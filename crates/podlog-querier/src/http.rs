//! The query shard's HTTP API: `/push` plus the same
//! `/api/{v1,v2}/logs{,/series,/range}` surface the store exposes, so a
//! client (or the global querier) can't tell whether it's talking to a
//! store or a query shard.

use std::sync::Arc;

use axum::extract::{ConnectInfo, Path as AxumPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use podlog_model::{ApiError, Chunk};
use podlog_query::{Endpoint, RangeResponseV1, RangeResponseV2, Request, SeriesResponse};

use crate::config::QuerierConfig;
use crate::index::ChunkIndex;
use crate::push::PushSender;
use crate::service::{QuerierService, RangeResult};

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<ChunkIndex>,
    pub config: Arc<QuerierConfig>,
    pub service: Arc<QuerierService>,
    pub push: PushSender,
    /// Resolved once at startup.
    pub peers: Arc<Vec<Endpoint>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/push", post(push))
        .route("/api/:version/logs", post(list_logs))
        .route("/api/:version/logs/series", post(series))
        .route("/api/:version/logs/range", post(range))
        .layer(tower_http::trace::TraceLayer::new_for_http())
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

/// The source address a push is attributed to: `X-Real-IP` if present,
/// falling back to the socket's peer address.
fn source_addr(headers: &HeaderMap, connect_info: &ConnectInfo<std::net::SocketAddr>) -> String {
    headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| connect_info.0.ip().to_string())
}

async fn push(
    State(state): State<AppState>,
    connect_info: ConnectInfo<std::net::SocketAddr>,
    headers: HeaderMap,
    Json(batch): Json<Vec<Chunk>>,
) -> StatusCode {
    let addr = source_addr(&headers, &connect_info);
    let ip = addr.split(':').next().unwrap_or(&addr).to_string();

    // Sharding: pushers fan out to every shard, but only the one
    // whose ordinal matches `hash(ip) mod modulus` keeps the data.
    if podlog_query::shard_of(&ip, state.config.modulus) != state.config.id {
        return StatusCode::NO_CONTENT;
    }

    if state.push.send(batch, addr).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::NO_CONTENT
}

async fn list_logs(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;
    let chunks = state.service.get_chunks_within_range(&req, &state.peers).await;
    podlog_metrics::add_http_request("logs", if chunks.is_empty() { 204 } else { 200 });
    if chunks.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(chunks).into_response())
}

async fn series(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;
    let series = state.service.get_series_in_blocks_within_range(&req, &state.peers).await.map_err(ApiErrorResponse)?;
    podlog_metrics::add_http_request("logs/series", 200);
    Ok(Json(SeriesResponse { series }).into_response())
}

async fn range(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(mut req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;
    req.version = version.clone();

    match state.service.get_range_within_range(&req, &state.peers).await.map_err(ApiErrorResponse)? {
        RangeResult::Entries(entries, page_info) => {
            podlog_metrics::add_http_request("logs/range", 200);
            Ok(Json(RangeResponseV2 { contents: entries, page_info }).into_response())
        }
        RangeResult::Raw(bytes, page_info) => {
            podlog_metrics::add_http_request("logs/range", 200);
            Ok(Json(RangeResponseV1 {
                contents: String::from_utf8_lossy(&bytes).into_owned(),
                page_info,
            })
            .into_response())
        }
    }
}
