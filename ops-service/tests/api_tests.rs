//! API integration tests driving the router end to end.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use ops_service::api::{create_router, AppState};
use ops_service::config::Config;

fn test_app() -> Router {
    create_router(AppState::new(Config::default()))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn mcp_request(app: Router, body: Value) -> Value {
    let (status, bytes) = post_json(app, "/api/mcp/request", body).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&bytes).unwrap()
}

/// Parse an NDJSON body into one JSON value per line.
fn ndjson_lines(bytes: &[u8]) -> Vec<Value> {
    std::str::from_utf8(bytes)
        .unwrap()
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/mcp/health")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "UP");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_operations_catalog() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/mcp/operations")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();

    let operations = json["operations"].as_object().unwrap();
    assert_eq!(operations.len(), 7);
    assert_eq!(operations["grep"]["streaming"], true);
    assert_eq!(operations["append_file"]["streaming"], false);
}

#[tokio::test]
async fn test_unary_create_then_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("note.txt").display().to_string();

    let created = mcp_request(
        test_app(),
        json!({
            "type": "request",
            "operation": "create_file",
            "parameters": {"path": path, "content": "alpha"},
            "stream": false
        }),
    )
    .await;
    assert_eq!(created["type"], "response");
    assert_eq!(created["status"], "success");
    assert_eq!(created["stream_complete"], true);
    assert_eq!(created["result"]["bytes_written"], 5);

    let read = mcp_request(
        test_app(),
        json!({
            "type": "request",
            "operation": "read_file",
            "parameters": {"path": path},
            "stream": false
        }),
    )
    .await;
    assert_eq!(read["result"]["content"], "alpha");
    assert_eq!(read["result"]["encoding"], "UTF-8");
}

#[tokio::test]
async fn test_unary_echoes_request_id() {
    let envelope = mcp_request(
        test_app(),
        json!({
            "type": "request",
            "id": "fixed-id-123",
            "operation": "list_directory",
            "parameters": {"path": "."},
            "stream": false
        }),
    )
    .await;
    assert_eq!(envelope["request_id"], "fixed-id-123");
}

#[tokio::test]
async fn test_unary_streaming_request_gets_stub() {
    // Historical quirk: the unary endpoint answers streaming requests with
    // a placeholder and nothing further.
    let envelope = mcp_request(
        test_app(),
        json!({
            "type": "request",
            "operation": "read_file",
            "parameters": {"path": "/etc/hosts"},
            "stream": true
        }),
    )
    .await;
    assert_eq!(envelope["type"], "response");
    assert_eq!(envelope["status"], "streaming");
    assert_eq!(envelope["stream_complete"], false);
    assert_eq!(envelope["result"], "Stream initiated");
}

#[tokio::test]
async fn test_unary_unknown_operation() {
    let envelope = mcp_request(
        test_app(),
        json!({
            "type": "request",
            "operation": "defragment",
            "parameters": {},
            "stream": false
        }),
    )
    .await;
    assert_eq!(envelope["type"], "error");
    assert_eq!(envelope["error_code"], "UNKNOWN_OPERATION");
}

#[tokio::test]
async fn test_unary_missing_parameter() {
    let envelope = mcp_request(
        test_app(),
        json!({
            "type": "request",
            "operation": "read_file",
            "parameters": {},
            "stream": false
        }),
    )
    .await;
    assert_eq!(envelope["type"], "error");
    assert_eq!(envelope["error_code"], "MISSING_PARAMETER");
}

#[tokio::test]
async fn test_unary_malformed_body() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/mcp/request")
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["error_code"], "REQUEST_ERROR");
    assert!(json.get("request_id").is_none());
}

#[tokio::test]
async fn test_forbidden_command_rejected_in_both_modes() {
    let envelope = mcp_request(
        test_app(),
        json!({
            "type": "request",
            "operation": "execute_command",
            "parameters": {"command": "rm -rf /"},
            "stream": false
        }),
    )
    .await;
    assert_eq!(envelope["type"], "error");
    assert_eq!(envelope["error_code"], "FORBIDDEN_COMMAND");

    let (status, bytes) = post_json(
        test_app(),
        "/api/mcp/stream",
        json!({
            "type": "request",
            "operation": "execute_command",
            "parameters": {"command": "rm -rf /"},
            "stream": true
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let lines = ndjson_lines(&bytes);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["type"], "error");
    assert_eq!(lines[0]["error_code"], "FORBIDDEN_COMMAND");
}

#[cfg(unix)]
#[tokio::test]
async fn test_ndjson_streaming_command_sequence() {
    let (status, bytes) = post_json(
        test_app(),
        "/api/mcp/stream",
        json!({
            "type": "request",
            "id": "stream-cmd-1",
            "operation": "execute_command",
            "parameters": {"command": "printf 'a\\nb\\nc\\n'"},
            "stream": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let lines = ndjson_lines(&bytes);
    assert_eq!(lines.len(), 5);

    for (index, line) in lines.iter().enumerate() {
        assert_eq!(line["type"], "stream_chunk");
        assert_eq!(line["request_id"], "stream-cmd-1");
        assert_eq!(line["sequence"], index as u64 + 1);
    }
    assert_eq!(lines[0]["data"], "STDOUT: a");
    assert_eq!(lines[1]["data"], "STDOUT: b");
    assert_eq!(lines[2]["data"], "STDOUT: c");
    assert_eq!(lines[3]["data"], "EXIT_CODE: 0");
    assert_eq!(lines[4]["is_final"], true);
    assert_eq!(lines[4]["data"], "STREAM_COMPLETE");
}

#[tokio::test]
async fn test_ndjson_streaming_read_windows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.txt");
    std::fs::write(&path, "z".repeat(3072)).unwrap();

    let (_, bytes) = post_json(
        test_app(),
        "/api/mcp/stream",
        json!({
            "type": "request",
            "operation": "read_file",
            "parameters": {"path": path.display().to_string()},
            "stream": true
        }),
    )
    .await;

    let lines = ndjson_lines(&bytes);
    // Three 1024-char windows plus the terminal sentinel.
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["data"].as_str().unwrap().len(), 1024);
    assert_eq!(lines[3]["is_final"], true);
}

#[tokio::test]
async fn test_ndjson_stream_error_in_band() {
    let (status, bytes) = post_json(
        test_app(),
        "/api/mcp/stream",
        json!({
            "type": "request",
            "operation": "read_file",
            "parameters": {"path": "/no/such/file"},
            "stream": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let lines = ndjson_lines(&bytes);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["type"], "error");
    assert_eq!(lines[0]["error_code"], "PATH_NOT_FOUND");
}

#[tokio::test]
async fn test_sse_stream_event_names() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("only.txt"), "needle").unwrap();

    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/mcp/sse-stream")
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "type": "request",
                        "operation": "grep",
                        "parameters": {
                            "pattern": "needle",
                            "path": dir.path().display().to_string()
                        },
                        "stream": true
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("event: stream-chunk"));
    assert!(body.contains("event: stream-complete"));
}

#[tokio::test]
async fn test_grep_aggregate_roundtrip() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "one match here").unwrap();
    std::fs::write(dir.path().join("b.txt"), "no hits").unwrap();

    let envelope = mcp_request(
        test_app(),
        json!({
            "type": "request",
            "operation": "grep",
            "parameters": {
                "pattern": "match",
                "path": dir.path().display().to_string()
            },
            "stream": false
        }),
    )
    .await;

    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["result"]["total_matches"], 1);
    assert_eq!(envelope["result"]["files_searched"], 2);
    assert_eq!(envelope["result"]["matches"][0]["line_number"], 1);
}
