//! End-to-end webhook flow against the router with a recording fake device.
//!
//! Covers the full request path: auth-free routing, immediate execution,
//! cooldown deferral, rate limiting, and the status endpoint's plain-text
//! contract.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use poegate::config::{Config, PortEntry, UnifiSettings, WebhookSettings};
use poegate::power::PowerController;
use poegate::server::{create_router, AppState};
use poegate::unifi::{DeviceError, PortActionClient};

/// Fake device that records every cycle request it receives.
struct RecordingDevice {
    calls: AtomicUsize,
}

#[async_trait]
impl PortActionClient for RecordingDevice {
    async fn power_cycle(&self, _port: u16) -> Result<(), DeviceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config() -> Config {
    let mut ports = BTreeMap::new();
    ports.insert(
        "3".to_string(),
        PortEntry {
            name: "pi-node-3".to_string(),
            ip: "172.16.254.103".to_string(),
        },
    );
    Config {
        unifi: UnifiSettings {
            api_key: "test".to_string(),
            base_url: "https://localhost".to_string(),
            site_id: "site".to_string(),
            device_id: "device".to_string(),
        },
        ports,
        webhook: WebhookSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            auth_token: String::new(),
        },
    }
}

fn build_app() -> (axum::Router, Arc<RecordingDevice>) {
    let device = Arc::new(RecordingDevice {
        calls: AtomicUsize::new(0),
    });
    let controller = Arc::new(PowerController::new(device.clone()));
    let app = create_router(AppState::new(test_config(), controller));
    (app, device)
}

async fn post(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get_text(app: &axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_cycle_then_off_flow() {
    let (app, device) = build_app();

    // First cycle goes straight to the device.
    let (status, body) = post(&app, "/power/cycle/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cycling");
    assert_eq!(device.calls.load(Ordering::SeqCst), 1);

    // A power_off right behind it lands inside the device cooldown and is
    // queued, not executed.
    let (status, body) = post(&app, "/power/off/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    let delay = body["queued_delay"].as_f64().unwrap();
    assert!(delay > 0.0 && delay <= 10.0, "queued_delay was {delay}");
    assert_eq!(device.calls.load(Ordering::SeqCst), 1);

    // Repeating the power_off inside the window is rate limited.
    let (status, body) = post(&app, "/power/off/3").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["rate_limited"], true);
    let retry_after = body["retry_after"].as_u64().unwrap();
    assert!(retry_after > 0 && retry_after <= 30);

    // The queued job has not run, but the port already reports stopped.
    let (status, text) = get_text(&app, "/power/status/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "status: stopped");
}

#[tokio::test]
async fn test_power_on_restores_running_status() {
    let (app, device) = build_app();

    let (status, _) = post(&app, "/power/off/3").await;
    assert_eq!(status, StatusCode::OK);

    let (_, text) = get_text(&app, "/power/status/3").await;
    assert_eq!(text, "status: stopped");

    let (status, body) = post(&app, "/power/on/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_action_needed");

    let (_, text) = get_text(&app, "/power/status/3").await;
    assert_eq!(text, "status: running");

    // power_on never produced a device call; only the initial off did.
    assert_eq!(device.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_port_rejected_before_the_coordinator() {
    let (app, device) = build_app();

    let (status, body) = post(&app, "/power/cycle/42").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Port 42 not configured");
    assert_eq!(device.calls.load(Ordering::SeqCst), 0);
}
