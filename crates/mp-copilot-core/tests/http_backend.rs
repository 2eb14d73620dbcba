use mp_copilot_core::{
    AiBackend, AssistMode, BackendError, CommandKind, CopilotConfig, HttpBackend, QueryRequest,
    TelemetrySnapshot, FALLBACK_MODELS,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Stub server
// ---------------------------------------------------------------------------

/// Serve exactly one request with a canned response. The handle yields the
/// raw request text.
async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let reason = if status == 200 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });
    (format!("http://{addr}"), handle)
}

/// Accept one connection and never answer.
async fn serve_silence() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });
    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request(mode: AssistMode) -> QueryRequest {
    QueryRequest {
        message: "take off to 10m".into(),
        mode,
        model: "qwen2.5:3b".into(),
        telemetry: TelemetrySnapshot::empty(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_success_with_command() {
    let (url, server) = serve_once(
        200,
        r#"{"success": true, "response": "Taking off.", "command": {"type": "TAKEOFF", "params": {"altitude": 10}}}"#,
    )
    .await;
    let backend = HttpBackend::new(&format!("{url}/"), TIMEOUT).unwrap();

    let reply = backend
        .query(request(AssistMode::Agent), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply.text, "Taking off.");
    let command = reply.command.expect("command expected");
    assert_eq!(CommandKind::from_token(&command.kind), Some(CommandKind::Takeoff));
    assert!(reply.ignored_command.is_none());

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /chat "));
    let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["message"], "take off to 10m");
    assert_eq!(json["mode"], "agent");
    assert_eq!(json["model"], "qwen2.5:3b");
    assert_eq!(json["telemetry"], serde_json::json!({}));
}

#[tokio::test]
async fn missing_response_text_is_placeholder() {
    let (url, _server) = serve_once(200, r#"{"success": true, "command": null}"#).await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    let reply = backend
        .query(request(AssistMode::Ask), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply.text, "[No response from AI]");
    assert!(reply.command.is_none());
}

#[tokio::test]
async fn success_false_is_rejected_with_backend_error() {
    let (url, _server) = serve_once(200, r#"{"success": false, "error": "model not loaded"}"#).await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    let err = backend
        .query(request(AssistMode::Ask), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Rejected(ref detail) if detail == "model not loaded"));

    let (url, _server) = serve_once(200, r#"{"success": false}"#).await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    let err = backend
        .query(request(AssistMode::Ask), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Unknown error");
}

#[tokio::test]
async fn non_2xx_reports_status_code() {
    let (url, _server) = serve_once(500, r#"{"detail": "boom"}"#).await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    let err = backend
        .query(request(AssistMode::Ask), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Backend error: HTTP 500");
}

#[tokio::test]
async fn malformed_command_is_dropped_with_diagnostic() {
    let (url, _server) = serve_once(
        200,
        r#"{"success": true, "response": "ok", "command": {"type": "GOTO", "params": [47.0, 8.5]}}"#,
    )
    .await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    let reply = backend
        .query(request(AssistMode::Agent), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply.text, "ok");
    assert!(reply.command.is_none());
    assert!(reply.ignored_command.unwrap().contains("params"));
}

#[tokio::test]
async fn cancellation_interrupts_pending_query() {
    let (url, server) = serve_silence().await;
    let backend = HttpBackend::new(&url, Duration::from_secs(30)).unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = backend
        .query(request(AssistMode::Ask), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Cancelled));
    server.abort();
}

#[tokio::test]
async fn slow_backend_times_out() {
    let (url, server) = serve_silence().await;
    let backend = HttpBackend::new(&url, Duration::from_millis(200)).unwrap();
    let err = backend
        .query(request(AssistMode::Ask), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Timeout));
    server.abort();
}

#[tokio::test]
async fn refused_connection_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}"), TIMEOUT).unwrap();
    let err = backend
        .query(request(AssistMode::Ask), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Unavailable));
    assert!(!backend.health_check().await);
}

#[tokio::test]
async fn health_requires_healthy_status() {
    let (url, server) = serve_once(200, r#"{"status": "healthy"}"#).await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    assert!(backend.health_check().await);
    assert!(server.await.unwrap().starts_with("GET /health "));

    let (url, _server) = serve_once(200, r#"{"status": "loading"}"#).await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    assert!(!backend.health_check().await);

    let (url, _server) = serve_once(503, r#"{"status": "healthy"}"#).await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    assert!(!backend.health_check().await);
}

#[tokio::test]
async fn status_reports_model_and_backend() {
    let (url, _server) = serve_once(200, r#"{"model": "qwen2.5:3b", "backend": "ollama"}"#).await;
    let backend = HttpBackend::new(&url, TIMEOUT).unwrap();
    let status = backend.status().await.unwrap();
    assert_eq!(status.model, "qwen2.5:3b");
    assert_eq!(status.backend, "ollama");
}

#[tokio::test]
async fn models_come_from_catalog() {
    let (catalog, server) = serve_once(
        200,
        r#"{"models": [{"name": "llama3.2:1b", "size": 1}, {"name": "qwen2.5:7b"}]}"#,
    )
    .await;
    let backend = HttpBackend::new("http://127.0.0.1:9", TIMEOUT)
        .unwrap()
        .with_model_catalog(&format!("{catalog}/"));
    assert_eq!(backend.available_models().await, vec!["llama3.2:1b", "qwen2.5:7b"]);
    assert!(server.await.unwrap().starts_with("GET /api/tags "));
}

#[tokio::test]
async fn models_fall_back_when_catalog_fails() {
    let (catalog, _server) = serve_once(500, r#"{}"#).await;
    let backend = HttpBackend::new("http://127.0.0.1:9", TIMEOUT)
        .unwrap()
        .with_model_catalog(&catalog);
    assert_eq!(backend.available_models().await, FALLBACK_MODELS);

    let (catalog, _server) = serve_once(200, r#"{"models": []}"#).await;
    let backend = HttpBackend::new("http://127.0.0.1:9", TIMEOUT)
        .unwrap()
        .with_model_catalog(&catalog);
    assert_eq!(backend.available_models().await, FALLBACK_MODELS);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let config = CopilotConfig {
        model_catalog_url: format!("http://{addr}"),
        ..CopilotConfig::default()
    };
    let backend = HttpBackend::from_config(&config).unwrap();
    assert_eq!(backend.available_models().await, FALLBACK_MODELS);
}
