//! Router-level tests over in-memory and local backends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vstream_api::{create_router, ApiConfig, AppState};
use vstream_firestore::MemoryJobStore;
use vstream_media::{output_dir_for, MediaResult, Transcoder};
use vstream_storage::FsObjectStore;
use vstream_worker::{TranscodeWorker, WorkerConfig};

const BOUNDARY: &str = "vstream-test-boundary";

/// Writes a one-rung ladder into the job directory instead of running ffmpeg.
struct FakeTranscoder;

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn encode(&self, input: &Path) -> MediaResult<PathBuf> {
        let dir = output_dir_for(input)?;
        tokio::fs::create_dir_all(dir.join("v0")).await?;
        tokio::fs::write(dir.join("master.m3u8"), "#EXTM3U\n").await?;
        tokio::fs::write(dir.join("v0/prog_index.m3u8"), "#EXTM3U\n").await?;
        tokio::fs::write(dir.join("v0/fileSequence0.ts"), [0x47u8; 376]).await?;
        Ok(dir)
    }
}

struct TestApp {
    router: Router,
    worker: TranscodeWorker,
    staging: TempDir,
    remote: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(ApiConfig::default())
    }

    fn with_config(config: ApiConfig) -> Self {
        let staging = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();

        let jobs = Arc::new(MemoryJobStore::new());
        let objects = Arc::new(FsObjectStore::new(remote.path()));
        let worker = TranscodeWorker::new(
            WorkerConfig {
                staging_dir: staging.path().to_path_buf(),
                ..WorkerConfig::default()
            },
            jobs.clone(),
            Arc::new(FakeTranscoder),
            objects.clone(),
        );

        let state = AppState::from_parts(config, jobs, objects, worker.clone());
        Self {
            router: create_router(state, None),
            worker,
            staging,
            remote,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn upload(&self, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let (status, _, body) = self.send(multipart_request(parts)).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn settle(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.worker.wait_idle())
            .await
            .expect("worker did not go idle");
    }

    fn staged_entries(&self) -> usize {
        std::fs::read_dir(self.staging.path()).unwrap().count()
    }
}

struct Part<'a> {
    field: &'a str,
    file_name: &'a str,
    content_type: &'a str,
    bytes: &'a [u8],
}

fn video_part(bytes: &[u8]) -> Part<'_> {
    Part {
        field: "video",
        file_name: "holiday.MP4",
        content_type: "video/mp4",
        bytes,
    }
}

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field, part.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        body.extend_from_slice(part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/medias/upload-video-hls")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn job_name_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches("/master.m3u8");
    trimmed.rsplit('/').next().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_reports_backends_and_worker() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["job_store"]["status"], "ok");
    assert_eq!(body["checks"]["object_store"]["status"], "ok");
    assert_eq!(body["worker"]["pending"], 0);
    assert_eq!(body["worker"]["running"], false);
}

#[tokio::test]
async fn test_upload_transcode_and_serve() {
    let app = TestApp::new();

    let (status, body) = app.upload(&[video_part(b"fake mp4 bytes")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Upload success");
    assert_eq!(body["result"][0]["type"], "hls");

    let url = body["result"][0]["url"].as_str().unwrap();
    assert!(url.starts_with("http://localhost:4000/static/video-hls/"));
    assert!(url.ends_with("/master.m3u8"));
    let name = job_name_from_url(url);
    assert_eq!(name.len(), 32);

    app.settle().await;

    let (status, body) = app
        .get_json(&format!("/medias/video-status/{name}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Get video status success");
    assert_eq!(body["result"]["name"], name.as_str());
    assert_eq!(body["result"]["status"], "success");

    let (status, headers, bytes) = app
        .get(&format!("/static/video-hls/{name}/master.m3u8"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/vnd.apple.mpegurl");
    assert_eq!(bytes, b"#EXTM3U\n");

    let (status, headers, bytes) = app
        .get(&format!("/static/video-hls/{name}/v0/fileSequence0.ts"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp2t");
    assert_eq!(bytes.len(), 376);

    // The raw upload is never published and the staging directory is gone
    let published = app.remote.path().join("videos-hls").join(&name);
    assert!(published.join("v0/prog_index.m3u8").is_file());
    assert!(!published.join(format!("{name}.mp4")).exists());
    assert_eq!(app.staged_entries(), 0);
}

#[tokio::test]
async fn test_upload_rejects_wrong_field_name() {
    let app = TestApp::new();
    let (status, body) = app
        .upload(&[Part {
            field: "file",
            ..video_part(b"bytes")
        }])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_upload");
    assert_eq!(app.staged_entries(), 0);
}

#[tokio::test]
async fn test_upload_rejects_unlisted_content_type() {
    let app = TestApp::new();
    let (status, body) = app
        .upload(&[Part {
            content_type: "image/png",
            file_name: "cat.png",
            ..video_part(b"bytes")
        }])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("image/png"));
    assert_eq!(app.staged_entries(), 0);
}

#[tokio::test]
async fn test_upload_rejects_oversized_video() {
    let app = TestApp::with_config(ApiConfig {
        max_video_size_bytes: 16,
        ..ApiConfig::default()
    });
    let (status, body) = app.upload(&[video_part(&[1u8; 64])]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("maximum size"));
    assert_eq!(app.staged_entries(), 0);
}

#[tokio::test]
async fn test_upload_over_declared_length_is_refused_before_staging() {
    let app = TestApp::with_config(ApiConfig {
        max_video_size_bytes: 16,
        ..ApiConfig::default()
    });
    let payload = vec![1u8; 2 * 1024 * 1024];
    let mut request = multipart_request(&[video_part(&payload)]);
    let length = request.body().size_hint().exact().unwrap();
    request
        .headers_mut()
        .insert(header::CONTENT_LENGTH, length.to_string().parse().unwrap());

    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.staged_entries(), 0);
}

#[tokio::test]
async fn test_upload_rejects_second_file() {
    let app = TestApp::new();
    let (status, _) = app
        .upload(&[video_part(b"one"), video_part(b"two")])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.staged_entries(), 0);
}

#[tokio::test]
async fn test_upload_rejects_missing_file() {
    let app = TestApp::new();
    let (status, body) = app.upload(&[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_upload");
}

#[tokio::test]
async fn test_status_of_unknown_job_is_null() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/medias/video-status/0123456789abcdef").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"].is_null());
}

#[tokio::test]
async fn test_status_of_short_unknown_ids_is_null() {
    let app = TestApp::new();
    for id in ["nope", "abc", "has_underscore", "dots.dots"] {
        let (status, body) = app.get_json(&format!("/medias/video-status/{id}")).await;
        assert_eq!(status, StatusCode::OK, "id {id}");
        assert!(body["result"].is_null(), "id {id}");
    }
}

#[tokio::test]
async fn test_status_of_job_enqueued_from_short_stem() {
    let app = TestApp::new();
    let dir = app.staging.path().join("abc");
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("abc.mp4");
    std::fs::write(&input, b"raw video").unwrap();

    app.worker.enqueue(&input).await.unwrap();
    app.settle().await;

    let (status, body) = app.get_json("/medias/video-status/abc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["name"], "abc");
    assert_eq!(body["result"]["status"], "success");
}

#[tokio::test]
async fn test_status_rejects_ids_that_escape_the_collection() {
    let app = TestApp::new();
    for id in ["%2E%2E", "a%2Fb", "a%5Cb"] {
        let (status, body) = app.get_json(&format!("/medias/video-status/{id}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "id {id}");
        assert_eq!(body["code"], "bad_request");
    }
}

#[tokio::test]
async fn test_artifact_proxy_missing_and_traversal() {
    let app = TestApp::new();

    let (status, body) = app.get_json("/static/video-hls/0123456789abcdef/master.m3u8").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found");

    let (status, _) = app
        .get_json("/static/video-hls/0123456789abcdef/%2E%2E/secret.ts")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get_json("/static/video-hls/0123456789abcdef/v0/a%2Fb.ts")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::new();
    let (_, headers, _) = app
        .send(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let app = TestApp::new();
    let (status, _, _) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
