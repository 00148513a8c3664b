//! Same `/api/{v1,v2}/logs{,/series,/range}` surface as the store and
//! query shard, fronting the cross-cluster fan-out instead of an
//! in-memory index.

use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use podlog_model::ApiError;
use podlog_query::{RangeResponseV1, RangeResponseV2, Request, SeriesResponse};

use crate::service::{GlobalQuerierService, RangeResult};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GlobalQuerierService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
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

async fn list_logs(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;
    let chunks = state.service.get_chunks_within_range(&req).await.map_err(ApiErrorResponse)?;
    podlog_metrics::add_http_request("logs", if chunks.is_empty() { 204 } else { 200 });
    if chunks.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(chunks).into_response())
}

async fn series(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;
    let series = state.service.get_series_in_blocks_within_range(&req).await.map_err(ApiErrorResponse)?;
    podlog_metrics::add_http_request("logs/series", 200);
    Ok(Json(SeriesResponse { series }).into_response())
}

async fn range(AxumPath(version): AxumPath<String>, State(state): State<AppState>, Json(mut req): Json<Request>) -> Result<Response, ApiErrorResponse> {
    check_version(&version)?;
    req.version = version.clone();

    match state.service.get_range_within_range(&req).await.map_err(ApiErrorResponse)? {
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
