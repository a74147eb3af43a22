use super::*;
use crate::config::{Config, ScannerConfig, StorageConfig};
use crate::scanner::testing::{FakeBackend, report};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


fn test_config(tmp: &TempDir) -> Config {
    let mut scanner = ScannerConfig::with_api_key("test-key");
    scanner.submit_interval = Duration::from_millis(1);
    scanner.poll_interval = Duration::from_millis(1);
    scanner.poll_retry_delay = Duration::from_millis(1);
    scanner.max_poll_attempts = 2;
    let mut config = Config {
        storage: StorageConfig {
            temp_root: tmp.path().join("temp"),
            ..Default::default()
        },
        scanner,
        ..Default::default()
    };
    config.api.public_base_url = "https://gate.test".to_string();
    config
}

fn create_test_gate(tmp: &TempDir, backend: FakeBackend) -> Arc<Gatekeeper> {
    Arc::new(Gatekeeper::with_backend(test_config(tmp), Arc::new(backend)).unwrap())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let tmp = TempDir::new().unwrap();
    let app = create_router(create_test_gate(&tmp, FakeBackend::clean()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["pending_links"], 0);
}

#[tokio::test]
async fn test_openapi_endpoint() {
    let tmp = TempDir::new().unwrap();
    let app = create_router(create_test_gate(&tmp, FakeBackend::clean()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/submit-data"].is_object());
}

#[tokio::test]
async fn test_swagger_ui_can_be_disabled() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.api.swagger_ui = false;
    let gate = Arc::new(Gatekeeper::with_backend(config, Arc::new(FakeBackend::clean())).unwrap());
    let app = create_router(gate);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/swagger-ui/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_enabled() {
    let tmp = TempDir::new().unwrap();
    let app = create_router(create_test_gate(&tmp, FakeBackend::clean()));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "chrome-extension://abcdef")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.api.cors_origins = vec!["https://allowed.example".to_string()];
    let gate = Arc::new(Gatekeeper::with_backend(config, Arc::new(FakeBackend::clean())).unwrap());

    let allowed = create_router(gate.clone())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "https://allowed.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        allowed.headers().get("access-control-allow-origin").unwrap(),
        "https://allowed.example"
    );

    let denied = create_router(gate)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(!denied.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_disabled() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.api.cors_enabled = false;
    let gate = Arc::new(Gatekeeper::with_backend(config, Arc::new(FakeBackend::clean())).unwrap());

    let response = create_router(gate)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_api_server_stops_on_shutdown_signal() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let gate = Arc::new(Gatekeeper::with_backend(config, Arc::new(FakeBackend::clean())).unwrap());

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(gate, async move {
        let _ = rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after the signal")
        .unwrap();
    assert!(result.is_ok());
}
