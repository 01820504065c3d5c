use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use kiosk_nullables::{NullCard, NullReader, NullRegistry, NullTransport};
use kiosk_rpc::{router, HealthResponse, HealthStatus, RpcState, ServiceState};
use kiosk_scanner::{Scanner, ScannerConfig};
use kiosk_types::{RegistryRecord, Verdict};
use kiosk_verification::VerificationEngine;
use kiosk_websocket::Broadcaster;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Fixture {
    app: Router,
    reader: Option<NullReader>,
    registry: Arc<NullRegistry>,
}

fn fixture(with_reader: bool) -> Fixture {
    let registry = Arc::new(NullRegistry::new());
    registry.insert(
        "policy",
        "asset",
        RegistryRecord {
            holder_id: "7".into(),
            holder_name: "Alan Turing".into(),
            department: "Logic".into(),
            issued_at: "2024-02-02".into(),
        },
    );
    let broadcaster = Arc::new(Broadcaster::new());

    let (scanner, reader) = if with_reader {
        let transport = NullTransport::new();
        let reader = transport.reader();
        let scanner = Scanner::new(
            Box::new(transport),
            VerificationEngine::new(registry.clone()),
            broadcaster.clone(),
            ScannerConfig {
                tick: Duration::from_millis(20),
                poll_timeout: Duration::from_millis(20),
                ..ScannerConfig::default()
            },
        );
        (Some(Arc::new(scanner)), Some(reader))
    } else {
        (None, None)
    };

    let app = router(RpcState {
        scanner,
        registry: registry.clone(),
        broadcaster,
        verify_timeout: Duration::from_millis(300),
    });
    Fixture {
        app,
        reader,
        registry,
    }
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_is_ok_with_reader_and_registry() {
    let f = fixture(true);
    let (status, body) = send(f.app, "GET", "/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthResponse = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(health.status, HealthStatus::Ok);
    assert_eq!(health.services.card_reader, ServiceState::Connected);
    assert_eq!(health.services.registry, ServiceState::Connected);
    assert_eq!(health.websocket_clients, 0);
    assert!(!health.scanner_running);
    assert_eq!(body["services"]["card_reader"], "connected");
}

#[tokio::test]
async fn health_is_degraded_without_reader() {
    let f = fixture(false);
    let (status, body) = send(f.app, "GET", "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["card_reader"], "disconnected");
}

#[tokio::test]
async fn health_is_degraded_when_registry_is_down() {
    let f = fixture(true);
    f.registry.set_unavailable(true);
    let (_, body) = send(f.app, "GET", "/api/health").await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["registry"], "disconnected");
}

#[tokio::test]
async fn verify_without_reader_is_unavailable() {
    let f = fixture(false);
    let (status, body) = send(f.app, "POST", "/api/verify").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_kind"], "reader_unavailable");
}

#[tokio::test]
async fn verify_without_card_times_out() {
    let f = fixture(true);
    let (status, body) = send(f.app, "POST", "/api/verify").await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["error_kind"], "no_card_detected");
}

#[tokio::test]
async fn verify_returns_the_verdict() {
    let f = fixture(true);
    f.reader.as_ref().unwrap().place(NullCard::with_payload(
        &[1, 2, 3, 4],
        &json!({"p": "policy", "a": "asset", "s": 7}),
    ));

    let (status, body) = send(f.app, "POST", "/api/verify").await;
    assert_eq!(status, StatusCode::OK);
    let verdict: Verdict = serde_json::from_value(body).unwrap();
    assert!(verdict.verified);
    assert_eq!(verdict.card_id, "01020304");
    assert_eq!(verdict.holder_id, "7");
    assert_eq!(verdict.holder_name, "Alan Turing");
}

#[tokio::test]
async fn verify_reports_a_failed_verdict_with_ok_status() {
    let f = fixture(true);
    f.reader.as_ref().unwrap().place(NullCard::with_payload(
        &[1, 2, 3, 4],
        &json!({"p": "policy", "a": "asset", "s": 8}),
    ));

    let (status, body) = send(f.app, "POST", "/api/verify").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], false);
    assert_eq!(body["error_kind"], "identifier_mismatch");
}
