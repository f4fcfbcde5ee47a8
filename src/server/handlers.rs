//! HTTP front-end for the power coordinator.
//!
//! Thin bridge between webhook calls and [`PowerController`]: it checks the
//! auth token, validates that the port is configured, and maps result shapes
//! onto HTTP codes (429 + `Retry-After` for rate limits, 500 for device
//! failures). The status endpoint answers with a plain-text body because a
//! MAAS monitoring integration scrapes it with a regex.

use axum::{
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::power::PowerOutcome;
use crate::server::state::AppState;

/// Create the Axum router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ports", get(list_ports))
        .route("/power/on/{port}", get(power_on).post(power_on))
        .route("/power/off/{port}", get(power_off).post(power_off))
        .route("/power/cycle/{port}", get(power_cycle).post(power_cycle))
        .route("/power/status/{port}", get(power_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Token check for all routes except `/health`. Accepts the token as a
/// bearer header or a `token` query parameter; when no token is configured,
/// authentication is disabled.
async fn require_auth_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let expected = &state.config.webhook.auth_token;
    if expected.is_empty() {
        return next.run(req).await;
    }

    let header_token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));
    let query_token = req.uri().query().and_then(|q| {
        q.split('&')
            .find_map(|pair| pair.strip_prefix("token="))
    });

    match header_token.or(query_token) {
        Some(provided) if provided == expected => next.run(req).await,
        _ => {
            warn!(path = req.uri().path(), "rejected unauthenticated request");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid or missing authentication token"})),
            )
                .into_response()
        }
    }
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "configured_ports": state.config.ports.keys().collect::<Vec<_>>(),
    }))
}

/// List configured ports and the endpoint map.
async fn list_ports(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "ports": state.config.ports,
        "webhook_endpoints": {
            "power_on": "/power/on/<port>",
            "power_off": "/power/off/<port>",
            "power_cycle": "/power/cycle/<port>",
            "status": "/power/status/<port>",
        },
    }))
}

fn port_not_configured(port: u16) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": format!("Port {} not configured", port)})),
    )
        .into_response()
}

/// Map a coordinator outcome onto an HTTP response.
fn outcome_response(outcome: PowerOutcome) -> Response {
    if outcome.is_rate_limited() {
        let retry_after = outcome.retry_after.unwrap_or(30);
        let mut response =
            (StatusCode::TOO_MANY_REQUESTS, Json(&outcome)).into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert("Retry-After", value);
        }
        return response;
    }

    let code = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(outcome)).into_response()
}

async fn power_on(State(state): State<AppState>, Path(port): Path<u16>) -> Response {
    if !state.config.is_port_configured(port) {
        return port_not_configured(port);
    }
    let outcome = state.controller.power_on(port);
    info!(port, success = outcome.success, "power ON request");
    outcome_response(outcome)
}

async fn power_off(State(state): State<AppState>, Path(port): Path<u16>) -> Response {
    if !state.config.is_port_configured(port) {
        return port_not_configured(port);
    }
    let outcome = state.controller.power_off(port).await;
    info!(port, success = outcome.success, "power OFF request");
    outcome_response(outcome)
}

async fn power_cycle(State(state): State<AppState>, Path(port): Path<u16>) -> Response {
    if !state.config.is_port_configured(port) {
        return port_not_configured(port);
    }
    let outcome = state.controller.power_cycle(port).await;
    info!(port, success = outcome.success, "power CYCLE request");
    outcome_response(outcome)
}

async fn power_status(State(state): State<AppState>, Path(port): Path<u16>) -> Response {
    if !state.config.is_port_configured(port) {
        return port_not_configured(port);
    }
    let report = state.controller.status(port);
    info!(port, status = %report.status, "status request");
    // Plain text body; the monitoring side matches `status.*:.*running`.
    report.status.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::power::controller::test_support::FlakyDevice;
    use crate::power::PowerController;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_app(auth_token: &str) -> Router {
        let mut config = Config::default();
        config.webhook.auth_token = auth_token.to_string();
        let device = Arc::new(FlakyDevice::reliable());
        let controller = Arc::new(PowerController::new(device));
        create_router(AppState::new(config, controller))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = create_test_app("secret");

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let app = create_test_app("secret");

        let response = app
            .oneshot(Request::builder().uri("/ports").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bearer_token_is_accepted() {
        let app = create_test_app("secret");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ports")
                    .header("authorization", "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["webhook_endpoints"].is_object());
    }

    #[tokio::test]
    async fn test_query_token_is_accepted() {
        let app = create_test_app("secret");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/power/status/1?token=secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unconfigured_port_is_a_bad_request() {
        let app = create_test_app("");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/power/cycle/9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_power_on_returns_no_action_needed() {
        let app = create_test_app("");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/power/on/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "no_action_needed");
        assert_eq!(body["action"], "power_on");
    }

    #[tokio::test]
    async fn test_repeat_cycle_is_429_with_retry_after() {
        let app = create_test_app("");

        let first = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/power/cycle/2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/power/cycle/2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after = second
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap();
        assert!(retry_after > 0 && retry_after <= 30);

        let body = body_json(second).await;
        assert_eq!(body["rate_limited"], true);
    }

    #[tokio::test]
    async fn test_status_body_is_the_literal_contract_string() {
        let app = create_test_app("");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/power/status/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"status: running");

        let off = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/power/off/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(off.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/power/status/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"status: stopped");
    }
}
