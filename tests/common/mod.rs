#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bili_downloader_lib::downloader::{DownloadProgress, NetworkConfig, ProgressReporter};
use futures::StreamExt;
use tokio::net::TcpListener;

pub const SITE_ROOT: &str = "https://www.bilibili.com";

// ============================================================================
// Mock bilibili service
// ============================================================================

/// How the fake media endpoint serves its body
#[derive(Debug, Clone)]
pub struct MediaSpec {
    pub body: Vec<u8>,
    pub declare_length: bool,
    /// Bytes per streamed piece
    pub piece: usize,
    /// Pause before each piece
    pub delay: Duration,
    pub status: StatusCode,
}

impl MediaSpec {
    pub fn bytes(len: usize) -> Self {
        Self {
            body: (0..len).map(|i| (i % 251) as u8).collect(),
            declare_length: true,
            piece: 64 * 1024,
            delay: Duration::ZERO,
            status: StatusCode::OK,
        }
    }

    pub fn without_length(mut self) -> Self {
        self.declare_length = false;
        self
    }

    pub fn slow(mut self, piece: usize, delay: Duration) -> Self {
        self.piece = piece;
        self.delay = delay;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockBili {
    pub cid: u64,
    pub view_status: StatusCode,
    pub view_body: Option<serde_json::Value>,
    /// `quality` reported by playurl; `None` echoes the requested qn
    pub served_quality: Option<u32>,
    pub playurl_status: StatusCode,
    pub playurl_body: Option<serde_json::Value>,
    pub media: MediaSpec,
}

impl Default for MockBili {
    fn default() -> Self {
        Self {
            cid: 279786,
            view_status: StatusCode::OK,
            view_body: None,
            served_quality: None,
            playurl_status: StatusCode::OK,
            playurl_body: None,
            media: MediaSpec::bytes(1024),
        }
    }
}

struct MockState {
    mock: MockBili,
    base_url: String,
    hits: Mutex<Vec<String>>,
}

type Shared = Arc<MockState>;

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(serde_json::json!({"code": -403, "message": "访问权限不足"})),
    )
        .into_response()
}

fn has_browser_agent(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ua| ua.starts_with("Mozilla/5.0"))
}

fn referer(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::REFERER).and_then(|v| v.to_str().ok())
}

async fn view(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.hits.lock().unwrap().push("view".to_string());
    let bvid = params.get("bvid").cloned().unwrap_or_default();
    let expected_referer = format!("{}/video/{}", SITE_ROOT, bvid);
    if !has_browser_agent(&headers) || referer(&headers) != Some(expected_referer.as_str()) {
        return forbidden();
    }

    let body = state.mock.view_body.clone().unwrap_or_else(|| {
        serde_json::json!({
            "code": 0,
            "message": "0",
            "data": {"bvid": bvid, "cid": state.mock.cid, "title": "mock video"}
        })
    });
    (state.mock.view_status, axum::Json(body)).into_response()
}

async fn playurl(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.hits.lock().unwrap().push("playurl".to_string());
    let bvid = params.get("bvid").cloned().unwrap_or_default();
    let expected_referer = format!("{}/video/{}", SITE_ROOT, bvid);
    if !has_browser_agent(&headers) || referer(&headers) != Some(expected_referer.as_str()) {
        return forbidden();
    }
    if params.get("cid") != Some(&state.mock.cid.to_string())
        || params.get("otype").map(String::as_str) != Some("json")
    {
        return (
            StatusCode::OK,
            axum::Json(serde_json::json!({"code": -400, "message": "请求错误"})),
        )
            .into_response();
    }

    let requested: u32 = params.get("qn").and_then(|q| q.parse().ok()).unwrap_or(0);
    let body = state.mock.playurl_body.clone().unwrap_or_else(|| {
        serde_json::json!({
            "code": 0,
            "message": "0",
            "data": {
                "quality": state.mock.served_quality.unwrap_or(requested),
                "accept_quality": [80, 64, 32, 16],
                "durl": [
                    {"url": format!("{}/media/stream.m4s", state.base_url), "size": state.mock.media.body.len()},
                    {"url": format!("{}/mirror/stream.m4s", state.base_url), "size": state.mock.media.body.len()}
                ]
            }
        })
    });
    (state.mock.playurl_status, axum::Json(body)).into_response()
}

async fn media(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.hits.lock().unwrap().push("media".to_string());
    let expected_referer = format!("{}/", SITE_ROOT);
    if referer(&headers) != Some(expected_referer.as_str()) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let spec = state.mock.media.clone();
    if spec.status != StatusCode::OK {
        return spec.status.into_response();
    }

    let total = spec.body.len();
    let pieces: Vec<Vec<u8>> = spec.body.chunks(spec.piece.max(1)).map(|c| c.to_vec()).collect();
    let delay = spec.delay;
    let stream = futures::stream::iter(pieces).then(move |piece| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok::<_, std::io::Error>(piece)
    });

    let mut response = Response::new(Body::from_stream(stream));
    if spec.declare_length {
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, total.into());
    }
    response
}

async fn mirror(State(state): State<Shared>) -> StatusCode {
    state.hits.lock().unwrap().push("mirror".to_string());
    StatusCode::GONE
}

// ============================================================================
// Test server infrastructure
// ============================================================================

pub struct TestServer {
    pub base_url: String,
    state: Shared,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(mock: MockBili) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let state = Arc::new(MockState {
            mock,
            base_url: base_url.clone(),
            hits: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/x/web-interface/view", get(view))
            .route("/x/player/playurl", get(playurl))
            .route("/media/stream.m4s", get(media))
            .route("/mirror/stream.m4s", get(mirror))
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        tokio::spawn(async move {
            server.await.unwrap();
        });

        Self {
            base_url,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Network config pointing the API at this server; referers stay on the real site.
    pub fn config(&self) -> NetworkConfig {
        NetworkConfig::default()
            .with_api_base(self.base_url.clone())
            .with_timeout(5)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Endpoints hit so far, in order
    pub fn hits(&self) -> Vec<String> {
        self.state.hits.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

// ============================================================================
// Progress capture
// ============================================================================

#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<DownloadProgress>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DownloadProgress> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for Recorder {
    fn report(&self, progress: DownloadProgress) {
        self.events.lock().unwrap().push(progress);
    }
}

pub fn assert_strictly_increasing(events: &[DownloadProgress]) {
    for pair in events.windows(2) {
        assert!(
            pair[1].bytes_transferred > pair[0].bytes_transferred,
            "bytes went from {} to {}",
            pair[0].bytes_transferred,
            pair[1].bytes_transferred
        );
        assert!(pair[1].percent_complete >= pair[0].percent_complete);
    }
}
