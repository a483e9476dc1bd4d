//! HTTP front
//!
//! Two surfaces over the same catalog: the read-only WebDAV share mounted under the
//! configured prefix, and download-by-id under `/files/{id}`. Handlers only read
//! projection snapshots; all tree maintenance happens in the builder worker.

pub mod dav;
pub mod download;

use crate::error::{ApiError, ContentError, ResolveError};
use crate::projection::Renderer;
use crate::service::CatalogService;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

const LAST_MODIFIED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CatalogService>,
    pub renderer: Arc<Renderer>,
    /// `Retry-After` seconds sent while the share is not ready
    pub retry_after_secs: u64,
}

impl AppState {
    pub fn new(service: Arc<CatalogService>, renderer: Renderer, retry_after_secs: u64) -> Self {
        Self {
            service,
            renderer: Arc::new(renderer),
            retry_after_secs,
        }
    }

    pub(crate) fn unavailable(&self) -> Response {
        ApiError::NotReady {
            retry_after_secs: self.retry_after_secs,
        }
        .into_response()
    }
}

/// All routes: `/files/{id}`, `/health`, and the share under the renderer's prefix.
///
/// The share is the fallback so that every method, including WebDAV extension
/// methods, reaches one dispatcher.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(download::health))
        .route("/files/:id", get(download::download_by_id))
        .fallback(dav::dav_handler)
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotReady { retry_after_secs } => {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, retry_after_secs.to_string())],
                    "Share is starting up, retry later",
                )
                    .into_response()
            }
            ApiError::Resolve(ResolveError::NotFound(_) | ResolveError::NotADirectory(_))
            | ApiError::FileNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Resolve(ResolveError::IsDirectory(_)) | ApiError::InvalidRevision(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::DuplicateContent(_) | ApiError::ReuploadBlocked(_) => StatusCode::CONFLICT,
            ApiError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Content(ContentError::Missing(_)) => {
                error!(error = %self, "File exists in catalog but not in storage");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => {
                error!(error = %self, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// Everything needed to answer a file fetch
pub(crate) struct Download {
    pub display_name: String,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub content_type: String,
}

impl Download {
    /// Whether `If-None-Match` already names this entity
    pub fn not_modified(&self, headers: &HeaderMap) -> bool {
        headers
            .get_all(header::IF_NONE_MATCH)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|tag| tag.trim().trim_start_matches("W/"))
            .any(|tag| tag == "*" || tag == self.etag)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let disposition = format!(
            "attachment; filename*=UTF-8''{}",
            utf8_percent_encode(&self.display_name, NON_ALPHANUMERIC)
        );
        let pairs = [
            (header::ETAG, self.etag.clone()),
            (
                header::LAST_MODIFIED,
                self.last_modified.format(LAST_MODIFIED_FORMAT).to_string(),
            ),
            (header::CONTENT_TYPE, self.content_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ];
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(name, value);
            }
        }
        headers
    }

    pub fn not_modified_response(&self) -> Response {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        if let Ok(etag) = HeaderValue::from_str(&self.etag) {
            response.headers_mut().insert(header::ETAG, etag);
        }
        response
    }

    /// 200 with the bytes, or with headers only for HEAD
    pub fn response(&self, bytes: Vec<u8>, with_body: bool) -> Response {
        let mut headers = self.headers();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        if with_body {
            (StatusCode::OK, headers, bytes).into_response()
        } else {
            (StatusCode::OK, headers).into_response()
        }
    }
}
