//! Download-by-id and health endpoints

use super::{AppState, Download};
use crate::error::ApiError;
use crate::types::FileId;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// `GET /files/{id}`: bytes of an active file, named by its current revision
pub async fn download_by_id(
    State(app): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Ok(id) = id.parse::<FileId>() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match send_file(&app, id, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn send_file(app: &AppState, id: FileId, headers: &HeaderMap) -> Result<Response, ApiError> {
    let record = app.service.active(id).await?;
    let download = Download {
        display_name: record.display_name(app.service.extension()),
        etag: record.etag(),
        last_modified: record.uploaded_on,
        content_type: app.renderer.content_type().to_string(),
    };
    if download.not_modified(headers) {
        return Ok(download.not_modified_response());
    }

    let bytes = app.service.content().open_for_read(&record.relative_path).await?;
    app.service.record_download(id).await;
    Ok(download.response(bytes, true))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthRes {
    pub status: &'static str,
    /// Whether the share has finished its first build
    pub ready: bool,
    pub pending_reindex: usize,
    pub pending_remove: usize,
}

/// `GET /health`
pub async fn health(State(app): State<AppState>) -> Json<HealthRes> {
    let state = app.service.state();
    let (pending_reindex, pending_remove) = state.pending_counts();
    Json(HealthRes {
        status: "ok",
        ready: state.is_ready(),
        pending_reindex,
        pending_remove,
    })
}
