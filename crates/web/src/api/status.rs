//! Status and health check endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: String,
}

#[derive(Serialize)]
struct StatusResponse {
    started_at: String,
    uptime_secs: i64,
    authentications: AuthenticationCounts,
}

#[derive(Serialize)]
struct AuthenticationCounts {
    succeeded: u64,
    no_certificate: u64,
    invalid_certificate: u64,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/status/health", get(health_check))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let uptime = Utc::now() - state.started_at;
    Json(StatusResponse {
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: uptime.num_seconds().max(0),
        authentications: AuthenticationCounts {
            succeeded: state.stats.succeeded(),
            no_certificate: state.stats.no_certificate(),
            invalid_certificate: state.stats.invalid_certificate(),
        },
    })
}

// ---------------------------------------------------------------------------
// Shared error type for API handlers
// ---------------------------------------------------------------------------

/// Simple API error type that converts to an Axum response.
pub enum AppError {
    BadRequest(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    use x509saml_core::config::AppConfig;
    use x509saml_core::models::ErrorKind;

    use crate::api::testing::{app, send, state};

    #[tokio::test]
    async fn test_health() {
        let request = Request::get("/api/status/health").body(Body::empty()).unwrap();
        let (status, json) = send(app(state(AppConfig::default())), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_status_reports_counters() {
        let state = state(AppConfig::default());
        state.stats.record_success();
        state.stats.record_failure(ErrorKind::InvalidCertificate);

        let request = Request::get("/api/status").body(Body::empty()).unwrap();
        let (status, json) = send(app(state), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["authentications"]["succeeded"], 1);
        assert_eq!(json["authentications"]["no_certificate"], 0);
        assert_eq!(json["authentications"]["invalid_certificate"], 1);
        assert!(json["uptime_secs"].as_i64().unwrap() >= 0);
    }

    #[test]
    fn test_app_error_status() {
        let response = super::AppError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
