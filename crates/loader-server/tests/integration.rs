use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use loader_core::metrics::{CpuStatus, DiskUsage, HostMetrics};
use loader_core::{board, shutdown_channel, BoardWriter, Level, StatusProjector};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct FixedMetrics;

impl HostMetrics for FixedMetrics {
    fn disk(&self) -> DiskUsage {
        DiskUsage::new(32_000_000_000, 8_000_000_000)
    }

    fn cpu(&self) -> CpuStatus {
        CpuStatus {
            usage: 37,
            temperature: 54,
        }
    }
}

fn app(include_output: bool) -> (BoardWriter, axum::Router) {
    let (writer, reader) = board();
    let projector = StatusProjector::new(reader, Arc::new(FixedMetrics));
    (writer, loader_server::build_router(projector, include_output))
}

/// Send a request via `oneshot` and return (status, headers, parsed JSON body).
async fn send(
    app: axum::Router,
    req: axum::http::Request<axum::body::Body>,
) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, headers, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _, json) = send(app, req).await;
    (status, json)
}

// ---------------------------------------------------------------------------
// Status endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_busy_board_with_metrics() {
    let (writer, app) = app(false);
    writer.set_total(Level::Cycle, 4);
    writer.tick(Level::Cycle);
    writer.set_status(Level::Cycle, "Loading Docker images");
    writer.tick(Level::Cycle);

    let (status, json) = get(app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "busy");
    assert_eq!(json["progress"].as_array().unwrap().len(), 4);
    assert_eq!(json["progress"][0]["progress"], 25);
    assert_eq!(json["progress"][0]["steps"]["current"], 1);
    assert_eq!(json["progress"][0]["steps"]["total"], 4);
    assert_eq!(json["progress"][0]["action"], "Loading Docker images");
    assert_eq!(json["disk"]["usage"], 75);
    assert_eq!(json["disk"]["free"], 8_000_000_000u64);
    assert_eq!(json["cpu"]["usage"], 37);
    assert_eq!(json["cpu"]["temperature"], 54);
}

#[tokio::test]
async fn root_path_serves_the_same_snapshot() {
    let (writer, app) = app(false);
    writer.complete();
    let (status, json) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ready");
    assert_eq!(json["progress"][3]["level"], 3);
}

#[tokio::test]
async fn failed_cycle_is_reported_as_error() {
    let (writer, app) = app(false);
    writer.fail("failed to bring up stack core: exited with code 1");
    let (_, json) = get(app, "/api/status").await;
    assert_eq!(json["status"], "error");
    for level in json["progress"].as_array().unwrap() {
        assert!(level["action"].as_str().unwrap().starts_with("ERROR: "));
    }
}

#[tokio::test]
async fn output_is_hidden_unless_enabled() {
    let (writer, quiet) = app(false);
    writer.set_output(Level::Step, Some("a3ed95caeb02: Pull complete".into()));
    let (_, json) = get(quiet, "/api/status").await;
    assert!(json["progress"][3]["output"].is_null());

    let (writer, loud) = app(true);
    writer.set_output(Level::Step, Some("a3ed95caeb02: Pull complete".into()));
    let (_, json) = get(loud, "/api/status").await;
    assert_eq!(json["progress"][3]["output"], "a3ed95caeb02: Pull complete");
}

#[tokio::test]
async fn head_request_succeeds_without_body() {
    let (_writer, app) = app(false);
    let req = axum::http::Request::builder()
        .method("HEAD")
        .uri("/api/status")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _, json) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.is_null());
}

#[tokio::test]
async fn cors_echoes_request_origin() {
    let (_writer, app) = app(false);
    let req = axum::http::Request::builder()
        .uri("/api/status")
        .header("origin", "http://duckiebot.local")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, headers, _) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "http://duckiebot.local"
    );
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (_writer, app) = app(false);
    let (status, _) = get(app, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_is_rejected() {
    let (_writer, app) = app(false);
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/status")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _, _) = send(app, req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// ---------------------------------------------------------------------------
// serve_on
// ---------------------------------------------------------------------------

#[tokio::test]
async fn serve_on_stops_on_shutdown() {
    let (_writer, reader) = board();
    let projector = StatusProjector::new(reader, Arc::new(FixedMetrics));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (trigger, shutdown) = shutdown_channel();

    let server = tokio::spawn(loader_server::serve_on(listener, projector, false, shutdown));
    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.trigger();

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}
