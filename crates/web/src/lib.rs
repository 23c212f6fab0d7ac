//! x509saml web server and REST API.
//!
//! Provides an Axum-based HTTP server with:
//! - Certificate authentication endpoint (`/auth/x509`)
//! - Error report controller (`/errorreport`)
//! - Status, health and configuration endpoints

pub mod api;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use x509saml_core::config::AppConfig;
use x509saml_core::mapper::AttributeMapper;
use x509saml_core::models::ErrorKind;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub mapper: AttributeMapper,
    pub stats: AuthStats,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let mapper = AttributeMapper::new(config.mapper.clone());
        Self {
            config,
            mapper,
            stats: AuthStats::default(),
            started_at: Utc::now(),
        }
    }
}

/// Authentication outcome counters since startup.
#[derive(Debug, Default)]
pub struct AuthStats {
    succeeded: AtomicU64,
    no_certificate: AtomicU64,
    invalid_certificate: AtomicU64,
}

impl AuthStats {
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::NoCertificate => &self.no_certificate,
            ErrorKind::InvalidCertificate => &self.invalid_certificate,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn no_certificate(&self) -> u64 {
        self.no_certificate.load(Ordering::Relaxed)
    }

    pub fn invalid_certificate(&self) -> u64 {
        self.invalid_certificate.load(Ordering::Relaxed)
    }
}

/// Build the full application router over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(api::authenticate::routes())
        .merge(api::error_report::routes())
        .merge(api::status::routes())
        .merge(api::config::routes())
        // Middleware
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: AppConfig) -> Self {
        Self {
            state: Arc::new(AppState::new(config)),
        }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn start<F>(self, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = router(self.state);

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("web server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counters() {
        let stats = AuthStats::default();
        stats.record_success();
        stats.record_failure(ErrorKind::NoCertificate);
        stats.record_failure(ErrorKind::NoCertificate);
        stats.record_failure(ErrorKind::InvalidCertificate);
        assert_eq!(stats.succeeded(), 1);
        assert_eq!(stats.no_certificate(), 2);
        assert_eq!(stats.invalid_certificate(), 1);
    }

    #[test]
    fn test_state_uses_configured_mapper() {
        let mut config = AppConfig::default();
        config.mapper.export_eppn = true;
        let state = AppState::new(config);
        assert!(state.mapper.config().export_eppn);
    }
}
