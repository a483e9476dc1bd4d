//! HTTP surfaces driven through the router without a socket

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use yeek::catalog::{CatalogSource, FileRecord, Revision, SledCatalog};
use yeek::content::FsContentStore;
use yeek::projection::{BuilderOptions, ProjectionState, Renderer, TreeBuilder};
use yeek::server::{router, AppState};
use yeek::service::CatalogService;

const SONG_BYTES: &[u8] = b"MThd\x00\x00\x00\x06\x00\x01\x00\x01\x00\x60";
const SONG_PATH: &str = "/webdav/Unsorted/A_M_Song.midi";

struct Share {
    _dir: TempDir,
    service: Arc<CatalogService>,
    builder: TreeBuilder,
    app: Router,
    song: FileRecord,
}

impl Share {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(SledCatalog::temporary().unwrap());
        let content = Arc::new(FsContentStore::new(dir.path().join("uploads"), true).unwrap());
        let state = Arc::new(ProjectionState::new());
        let service = Arc::new(CatalogService::new(
            catalog,
            content,
            state,
            1024 * 1024,
            "midi",
        ));
        let song = service
            .ingest(
                SONG_BYTES,
                "song.mid",
                Revision::new("Song").with_album("M").with_artists(["A"]),
            )
            .await
            .unwrap();

        let builder = TreeBuilder::new(
            Arc::clone(service.state()),
            service.catalog().clone(),
            BuilderOptions::default(),
        );
        let app = router(AppState::new(
            Arc::clone(&service),
            Renderer::new("/webdav", "audio/midi"),
            10,
        ));
        Self {
            _dir: dir,
            service,
            builder,
            app,
            song,
        }
    }

    async fn ready() -> Self {
        let mut share = Self::new().await;
        share.builder.run_pass().await.unwrap();
        share
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, headers, body)
    }

    async fn call(&self, method: &str, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        self.send(request(method, uri)).await
    }

    async fn downloads(&self) -> u64 {
        self.service
            .catalog()
            .get_record(self.song.id)
            .await
            .unwrap()
            .unwrap()
            .downloads
    }
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::from_bytes(method.as_bytes()).unwrap())
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn text(body: &[u8]) -> String {
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_options_advertises_capabilities() {
    let share = Share::ready().await;
    let (status, headers, _) = share.call("OPTIONS", "/webdav/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["dav"], "1,2");
    assert_eq!(headers["ms-author-via"], "DAV");
    assert!(headers[header::ALLOW].to_str().unwrap().contains("PROPFIND"));
}

#[tokio::test]
async fn test_unready_share_asks_to_retry() {
    let share = Share::new().await;

    let (status, headers, _) = share.call("PROPFIND", "/webdav/").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers[header::RETRY_AFTER], "10");

    for method in ["GET", "HEAD", "OPTIONS", "LOCK", "UNLOCK", "PUT"] {
        let (status, headers, _) = share.call(method, SONG_PATH).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", method);
        assert_eq!(headers[header::RETRY_AFTER], "10");
    }
}

#[tokio::test]
async fn test_retry_after_follows_configuration() {
    let share = Share::new().await;
    let app = router(AppState::new(
        Arc::clone(&share.service),
        Renderer::new("/webdav", "audio/midi"),
        3,
    ));
    let response = app.oneshot(request("OPTIONS", "/webdav/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::RETRY_AFTER], "3");
}

#[tokio::test]
async fn test_propfind_lists_views() {
    let share = Share::ready().await;
    let request = Request::builder()
        .method(Method::from_bytes(b"PROPFIND").unwrap())
        .uri("/webdav/")
        .header("Depth", "1")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = share.send(request).await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/xml"));
    let body = text(&body);
    assert_eq!(body.matches("<d:response>").count(), 5);
    for view in ["Unsorted", "Albums", "Artist", "Alphabetical"] {
        assert!(body.contains(&format!("<d:href>/webdav/{}/</d:href>", view)));
    }
}

#[tokio::test]
async fn test_propfind_is_case_insensitive_with_canonical_hrefs() {
    let share = Share::ready().await;
    let (status, _, body) = share.call("PROPFIND", "/webdav/unsorted").await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    let body = text(&body);
    assert!(body.contains("<d:href>/webdav/Unsorted/</d:href>"));
    assert!(body.contains(&format!("<d:href>{}</d:href>", SONG_PATH)));
    assert!(body.contains("<d:getcontenttype>audio/midi</d:getcontenttype>"));
    assert!(body.contains(&format!(
        "<d:getcontentlength>{}</d:getcontentlength>",
        SONG_BYTES.len()
    )));
}

#[tokio::test]
async fn test_propfind_missing_path_is_not_found() {
    let share = Share::ready().await;
    let (status, _, _) = share.call("PROPFIND", "/webdav/Nowhere/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_file_and_conditional_get() {
    let share = Share::ready().await;
    let (status, headers, body) = share.call("GET", SONG_PATH).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SONG_BYTES);
    let etag = headers[header::ETAG].to_str().unwrap().to_string();
    assert_eq!(etag, share.song.etag());
    assert_eq!(headers[header::CONTENT_TYPE], "audio/midi");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("A_M_Song.midi"));
    assert_eq!(share.downloads().await, 1);

    let conditional = Request::builder()
        .method(Method::GET)
        .uri(SONG_PATH)
        .header(header::IF_NONE_MATCH, etag.as_str())
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = share.send(conditional).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
    assert_eq!(share.downloads().await, 1);
}

#[tokio::test]
async fn test_get_with_other_casing_serves_same_file() {
    let share = Share::ready().await;
    let (status, _, body) = share.call("GET", "/webdav/ALBUMS/m/a_m_song.MIDI").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SONG_BYTES);
}

#[tokio::test]
async fn test_head_sends_headers_only() {
    let share = Share::ready().await;
    let (status, headers, body) = share.call("HEAD", SONG_PATH).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(
        headers[header::CONTENT_LENGTH],
        SONG_BYTES.len().to_string().as_str()
    );
    assert_eq!(share.downloads().await, 0);
}

#[tokio::test]
async fn test_get_errors() {
    let share = Share::ready().await;

    let (status, _, _) = share.call("GET", "/webdav/Unsorted").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = share.call("GET", "/webdav").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = share.call("GET", "/webdav/Unsorted/missing.midi").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = share.call("GET", "/elsewhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_writes_are_refused() {
    let share = Share::ready().await;
    for method in ["PUT", "DELETE", "MKCOL", "MOVE", "COPY", "PROPPATCH"] {
        let (status, headers, body) = share.call(method, SONG_PATH).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", method);
        assert!(headers.contains_key("x-msdavext_error"));
        assert!(text(&body).contains("read-only"));
    }
    assert_eq!(share.builder.state().snapshot_root().count_placements(share.song.id), 4);
}

#[tokio::test]
async fn test_lock_is_mocked() {
    let share = Share::ready().await;
    let (status, headers, body) = share.call("LOCK", SONG_PATH).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("lock-token"));
    assert!(text(&body).contains("<d:lockdiscovery>"));

    let (status, _, _) = share.call("UNLOCK", SONG_PATH).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unknown_method_is_not_allowed() {
    let share = Share::ready().await;
    let (status, headers, _) = share.call("PATCH", SONG_PATH).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(headers.contains_key(header::ALLOW));
}

#[tokio::test]
async fn test_download_by_id() {
    let share = Share::new().await;
    let uri = format!("/files/{}", share.song.id);

    // Download by id does not wait for the share.
    let (status, headers, body) = share.call("GET", &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SONG_BYTES);
    assert_eq!(headers[header::ETAG].to_str().unwrap(), share.song.etag());
    assert_eq!(share.downloads().await, 1);

    let (status, _, _) = share.call("GET", "/files/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let unknown = format!("/files/{}", uuid::Uuid::from_u128(7));
    let (status, _, _) = share.call("GET", &unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    share.service.delete(share.song.id, "takedown", false).await.unwrap();
    let (status, _, _) = share.call("GET", &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleted_file_leaves_share_after_pass() {
    let mut share = Share::ready().await;
    share.service.delete(share.song.id, "takedown", false).await.unwrap();

    // Still visible until the builder runs.
    let (status, _, _) = share.call("GET", SONG_PATH).await;
    assert_eq!(status, StatusCode::OK);

    share.builder.run_pass().await.unwrap();
    let (status, _, _) = share.call("GET", SONG_PATH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_readiness() {
    let mut share = Share::new().await;

    let (status, _, body) = share.call("GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["ready"], false);
    assert_eq!(health["pending_reindex"], 1);

    share.builder.run_pass().await.unwrap();
    let (_, _, body) = share.call("GET", "/health").await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["ready"], true);
    assert_eq!(health["pending_reindex"], 0);
}
