//! Certificate authentication endpoint.
//!
//! The TLS terminator forwards the client certificate in a request header;
//! this handler maps it and returns either the assertion attributes or an
//! error report.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use x509saml_core::error_report::ErrorReport;
use x509saml_core::models::{AttributeSet, ErrorKind, MapperOutcome, PresentedCertificate};

use crate::api::error_report::request_context;
use crate::AppState;

#[derive(Serialize)]
struct AuthResponse {
    subject_id: Option<String>,
    attributes: AttributeSet,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/x509", get(authenticate))
}

async fn authenticate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    version: Version,
) -> Response {
    let header_name = state.config.source.header.as_str();
    let presented = match headers.get(header_name).map(|v| v.to_str()) {
        None => PresentedCertificate::Missing,
        Some(Ok(raw)) => PresentedCertificate::from_raw(Some(raw)),
        Some(Err(_)) => {
            warn!(header = header_name, "certificate header is not visible ASCII");
            PresentedCertificate::Invalid(format!("{header_name} header is not visible ASCII"))
        }
    };

    match state.mapper.map(&presented) {
        MapperOutcome::Success {
            subject_id,
            attributes,
        } => {
            state.stats.record_success();
            info!(
                subject = subject_id.as_deref().unwrap_or(""),
                attributes = attributes.len(),
                "certificate authentication succeeded"
            );
            Json(AuthResponse {
                subject_id,
                attributes,
            })
            .into_response()
        }
        MapperOutcome::Failure(kind) => {
            state.stats.record_failure(kind);
            let ctx = request_context(&state.config, &headers, &uri, version);
            let report = ErrorReport::for_kind(kind, &ctx);
            report.log();
            (failure_status(kind), Json(report)).into_response()
        }
    }
}

fn failure_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NoCertificate => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidCertificate => StatusCode::BAD_REQUEST,
    }
}
