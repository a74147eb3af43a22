//! Wiremock stand-ins for the analysis backend and the download source

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Accept uploads of `filename` and hand back `/api/v3/analyses/<analysis_id>`
pub async fn mount_submission(backend: &MockServer, filename: &str, analysis_id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v3/files"))
        .and(header("x-apikey", "integration-key"))
        .and(body_string_contains(format!("filename=\"{}\"", filename)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "type": "analysis",
                "id": analysis_id,
                "links": {
                    "self": format!("{}/api/v3/analyses/{}", backend.uri(), analysis_id)
                }
            }
        })))
        .mount(backend)
        .await;
}

/// Reject every upload with `status`
pub async fn mount_failing_submissions(backend: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/api/v3/files"))
        .respond_with(ResponseTemplate::new(status))
        .mount(backend)
        .await;
}

/// Serve a finished analysis with the given detection counts
pub async fn mount_completed(backend: &MockServer, analysis_id: &str, malicious: u32, suspicious: u32) {
    mount_analysis(backend, analysis_id, "completed", malicious, suspicious).await;
}

/// Serve an analysis in an arbitrary state
pub async fn mount_analysis(
    backend: &MockServer,
    analysis_id: &str,
    status: &str,
    malicious: u32,
    suspicious: u32,
) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/analyses/{}", analysis_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(analysis_body(
            status, malicious, suspicious,
        )))
        .mount(backend)
        .await;
}

/// Serve an arbitrary JSON body as the analysis object
pub async fn mount_analysis_body(backend: &MockServer, analysis_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/analyses/{}", analysis_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(backend)
        .await;
}

/// JSON body of a v3 analysis object
pub fn analysis_body(status: &str, malicious: u32, suspicious: u32) -> serde_json::Value {
    json!({
        "data": {
            "type": "analysis",
            "attributes": {
                "status": status,
                "stats": {
                    "harmless": 0,
                    "malicious": malicious,
                    "suspicious": suspicious,
                    "undetected": 60
                }
            }
        }
    })
}

/// Serve `body` at `route` from a fresh source server
pub async fn source_serving(route: &str, body: Vec<u8>) -> MockServer {
    let source = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&source)
        .await;
    source
}

/// Number of requests `server` received for `method_name` on `route`
pub async fn request_count(server: &MockServer, method_name: &str, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == method_name && r.url.path() == route)
        .count()
}
