//! Configuration API endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use x509saml_core::config::{MapperConfig, SourceConfig};

use crate::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ConfigResponse {
    daemon: DaemonConfigView,
    mapper: MapperConfig,
    source: SourceConfig,
    web: WebConfigView,
}

#[derive(Serialize)]
struct DaemonConfigView {
    log_level: String,
}

#[derive(Serialize)]
struct WebConfigView {
    listen: String,
    base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/config", get(get_config))
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let cfg = &state.config;

    Json(ConfigResponse {
        daemon: DaemonConfigView {
            log_level: cfg.daemon.log_level.clone(),
        },
        mapper: cfg.mapper.clone(),
        source: cfg.source.clone(),
        web: WebConfigView {
            listen: cfg.web.listen.clone(),
            base_url: cfg.web.base_url.clone(),
        },
    })
}
