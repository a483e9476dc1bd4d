//! WebDAV share
//!
//! Read-only share over the projection: `OPTIONS`, `PROPFIND`, `GET`/`HEAD` and a
//! mock `LOCK`/`UNLOCK` (clients opening a file for writing lock it first and give
//! up if that fails; the lock is never enforced). Write methods are refused.
//! Until the first projection pass completes every method answers 503.

use super::{AppState, Download};
use crate::error::ApiError;
use crate::projection::{resolve, split_path, Depth, Expect};
use crate::projection::render::xml_escape;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::debug;

const ALLOW: &str = "OPTIONS, PROPFIND, GET, HEAD";
const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const READ_ONLY_MESSAGE: &str = "The network share is read-only. Use the website to modify contents.";
/// Windows WebDAV redirector code for a server-side refusal
const MSDAVEXT_FORBIDDEN: &str = "589838";

/// Dispatch every request below the share prefix by method
pub async fn dav_handler(
    State(app): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let Some(relative) = share_relative(app.renderer.prefix(), uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !app.service.state().is_ready() {
        return app.unavailable();
    }
    let segments = split_path(relative);
    debug!(method = %method, path = %uri.path(), "Share request");

    match method.as_str() {
        "OPTIONS" => options(),
        "PROPFIND" => propfind(&app, &segments, &headers),
        "GET" => fetch(&app, &segments, &headers, true).await,
        "HEAD" => fetch(&app, &segments, &headers, false).await,
        "LOCK" => mock_lock(),
        "UNLOCK" => StatusCode::NO_CONTENT.into_response(),
        "PUT" | "DELETE" | "MKCOL" | "MOVE" | "COPY" | "PROPPATCH" => read_only(),
        _ => (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, ALLOW)]).into_response(),
    }
}

/// Path below `prefix`, or `None` when `path` is outside the share
fn share_relative<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn options() -> Response {
    (
        StatusCode::OK,
        [
            (header::ALLOW.as_str(), ALLOW),
            ("DAV", "1,2"),
            ("MS-Author-Via", "DAV"),
        ],
    )
        .into_response()
}

fn propfind(app: &AppState, segments: &[String], headers: &HeaderMap) -> Response {
    let state = app.service.state();
    let depth = Depth::parse_header(headers.get("depth").and_then(|v| v.to_str().ok()));
    let root = state.snapshot_root();
    match resolve(&root, segments, Expect::Any) {
        Ok(resolved) => {
            let body = app.renderer.render(&resolved, depth);
            (
                StatusCode::MULTI_STATUS,
                [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
                body,
            )
                .into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn fetch(app: &AppState, segments: &[String], headers: &HeaderMap, with_body: bool) -> Response {
    if segments.is_empty() {
        return (StatusCode::BAD_REQUEST, "Path cannot be empty").into_response();
    }
    let state = app.service.state();
    let (id, relative_path, download) = {
        let root = state.snapshot_root();
        let entry = match resolve(&root, segments, Expect::File) {
            Ok(resolved) => match resolved.as_file() {
                Some(entry) => entry.clone(),
                None => return StatusCode::BAD_REQUEST.into_response(),
            },
            Err(e) => return ApiError::from(e).into_response(),
        };
        let download = Download {
            display_name: entry.display_name.clone(),
            etag: entry.etag(),
            last_modified: entry.uploaded_on,
            content_type: app.renderer.content_type().to_string(),
        };
        (entry.id, entry.relative_path, download)
    };

    if download.not_modified(headers) {
        return download.not_modified_response();
    }

    match app.service.content().open_for_read(&relative_path).await {
        Ok(bytes) => {
            if with_body {
                app.service.record_download(id).await;
            }
            download.response(bytes, with_body)
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn mock_lock() -> Response {
    let token = format!("opaquelocktoken:{}", uuid::Uuid::new_v4());
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <d:prop xmlns:d=\"DAV:\"><d:lockdiscovery><d:activelock>\
         <d:locktype><d:write/></d:locktype>\
         <d:lockscope><d:exclusive/></d:lockscope>\
         <d:depth>infinity</d:depth>\
         <d:owner>yeek</d:owner>\
         <d:timeout>Second-3600</d:timeout>\
         <d:locktoken><d:href>{}</d:href></d:locktoken>\
         </d:activelock></d:lockdiscovery></d:prop>",
        xml_escape(&token)
    );

    let mut response = (StatusCode::OK, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("<{}>", token)) {
        response.headers_mut().insert("lock-token", value);
    }
    response
}

fn read_only() -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <d:error xmlns:d=\"DAV:\"><d:forbidden/>\
         <d:responsedescription>{}</d:responsedescription></d:error>",
        xml_escape(READ_ONLY_MESSAGE)
    );
    let reason = format!(
        "{}; {}",
        MSDAVEXT_FORBIDDEN,
        utf8_percent_encode(READ_ONLY_MESSAGE, NON_ALPHANUMERIC)
    );

    let mut response = (StatusCode::FORBIDDEN, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response();
    if let Ok(value) = HeaderValue::from_str(&reason) {
        response.headers_mut().insert("x-msdavext_error", value);
    }
    response
}
