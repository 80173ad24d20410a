//! Delay client tests against a wiremock server

use super::*;
use crate::error::AppError;
use serde_json::json;
use std::time::Instant;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Mock delay endpoint for controlled testing scenarios
struct MockDelayServer {
    server: MockServer,
}

impl MockDelayServer {
    async fn new() -> Self {
        Self { server: MockServer::start().await }
    }

    fn url(&self) -> String {
        self.server.uri()
    }

    async fn mock_json(&self, request_path: &str, status: u16, body: serde_json::Value, delay_ms: u64) {
        let template = ResponseTemplate::new(status)
            .set_body_json(body)
            .set_delay(Duration::from_millis(delay_ms));

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    async fn mock_raw(&self, request_path: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn test_successful_delay_with_http3_stats() {
    let server = MockDelayServer::new().await;
    server.mock_json(
        "/delay/0.1",
        200,
        json!({
            "origin": "203.0.113.7",
            "method": "GET",
            "http3": {
                "protocol": "HTTP/3",
                "rtt": "12.5ms",
                "dropped_packets": 0,
                "congestion_window": 1048576,
                "qlog_visualization_link": "https://qvis.example/abc"
            }
        }),
        100,
    ).await;

    let client = HttpDelayClient::new(&server.url()).unwrap();
    let started = Instant::now();
    let payload = client.delay(0.1).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(payload.origin.as_deref(), Some("203.0.113.7"));
    assert_eq!(payload.method.as_deref(), Some("GET"));
    assert_eq!(payload.http_version.as_deref(), Some("HTTP/1.1"));

    let transport = payload.transport.unwrap();
    assert_eq!(transport.protocol.as_deref(), Some("HTTP/3"));
    assert_eq!(transport.dropped_packets, Some(0));
    assert_eq!(transport.congestion_window_bytes, Some(1_048_576));
}

#[tokio::test]
async fn test_both_qlog_keys_decode_as_success() {
    let server = MockDelayServer::new().await;
    server.mock_json(
        "/delay/0",
        200,
        json!({
            "origin": "203.0.113.7",
            "http3": {
                "protocol": "HTTP/3",
                "qlog_url": "https://cdn.example/trace.sqlog",
                "qlog_visualization_link": "https://qvis.example/?file=trace.sqlog"
            }
        }),
        0,
    ).await;

    let client = HttpDelayClient::new(&server.url()).unwrap();
    let payload = client.delay(0.0).await.unwrap();

    let transport = payload.transport.unwrap();
    assert_eq!(transport.qlog_url.as_deref(), Some("https://cdn.example/trace.sqlog"));
}

#[tokio::test]
async fn test_plain_response_has_no_transport_info() {
    let server = MockDelayServer::new().await;
    server.mock_json("/delay/2", 200, json!({"origin": "127.0.0.1", "method": "GET"}), 0).await;

    let client = HttpDelayClient::new(&server.url()).unwrap();
    let payload = client.delay(2.0).await.unwrap();
    assert!(payload.transport.is_none());
}

#[tokio::test]
async fn test_error_status_becomes_http_error() {
    let server = MockDelayServer::new().await;
    server.mock_raw("/delay/1", 503, "overloaded").await;

    let client = HttpDelayClient::new(&server.url()).unwrap();
    let error = client.delay(1.0).await.unwrap_err();

    assert!(matches!(error, AppError::HttpRequest(_)));
    assert_eq!(error.detail(), "HTTP 503: Service Unavailable");
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockDelayServer::new().await;
    server.mock_raw("/delay/1", 200, "<html>not json</html>").await;

    let client = HttpDelayClient::new(&server.url()).unwrap();
    let error = client.delay(1.0).await.unwrap_err();
    assert!(matches!(error, AppError::Parse(_)), "got {:?}", error);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Grab a free port, then release it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpDelayClient::new(&format!("http://{}", addr)).unwrap();
    let error = client.delay(0.0).await.unwrap_err();
    assert!(matches!(error, AppError::Network(_)), "got {:?}", error);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_client() {
    let server = MockDelayServer::new().await;
    server.mock_json("/delay/0.2", 200, json!({"method": "GET"}), 200).await;

    let client = std::sync::Arc::new(HttpDelayClient::new(&server.url()).unwrap());
    let started = Instant::now();
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.delay(0.2).await })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }

    // All five overlap instead of running back to back
    assert!(started.elapsed() < Duration::from_millis(900));
}
