//! x509saml daemon entry point.
//!
//! Loads configuration, starts the web server that maps forwarded client
//! certificates, and drains it on SIGTERM / Ctrl+C.

mod signals;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use x509saml_core::config::AppConfig;
use x509saml_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// x509saml certificate authentication daemon.
#[derive(Parser, Debug)]
#[command(
    name = "x509saml-daemon",
    version,
    about = "Serve X.509 client certificate to SAML attribute mapping over HTTP"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config =
        AppConfig::load_from_file(&args.config).context("failed to load configuration file")?;
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    let mapper = &config.mapper;

    // Startup banner
    info!("========================================");
    info!("  x509saml Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file   : {}", args.config.display());
    info!("Cert header   : {}", config.source.header);
    info!("Name attribute: {} -> {}", mapper.cert_name_attribute, mapper.assertion_name_attribute);
    info!("SAN emails    : {}", mapper.parse_san_emails);
    info!("Policies      : {}", mapper.parse_policy);
    info!("Export eppn   : {}", mapper.export_eppn);
    info!("Web listen    : {}", config.web.listen);
    info!("Log level     : {}", log_level);
    info!("========================================");

    if config.web.base_url.is_none() {
        warn!("web.base_url not set; error reports derive it from the request Host header");
    }

    let listen_addr = config.web.listen.clone();
    let web_server = WebServer::new(config);

    web_server
        .start(&listen_addr, async {
            signals::wait_for_shutdown().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await
        .context("web server error")?;

    info!("x509saml daemon stopped.");
    Ok(())
}
