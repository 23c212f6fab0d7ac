//! x509saml command-line tool.
//!
//! Maps client certificates to SAML attributes offline, dumps parsed
//! certificate fields, and generates / validates configuration files.

mod input;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use x509saml_core::config::AppConfig;
use x509saml_core::error_report::describe;
use x509saml_core::mapper::AttributeMapper;
use x509saml_core::models::{
    CertificateRecord, ExtensionValue, IssuerName, MapperOutcome, PresentedCertificate,
};

use input::CertSource;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// x509saml command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "x509saml",
    version,
    about = "Map X.509 client certificates to SAML assertion attributes"
)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Map a client certificate to assertion attributes.
    Map {
        /// PEM or DER certificate file, `-` for stdin. Defaults to the
        /// configured environment variable.
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show the parsed fields of a client certificate.
    Inspect {
        /// PEM or DER certificate file, `-` for stdin.
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./x509saml.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => {
            let path = cli
                .config
                .as_deref()
                .context("no configuration file given; pass --config PATH")?;
            cmd_validate(path)
        }
        Commands::Map { cert, json } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_map(&config, cert.as_deref(), json)
        }
        Commands::Inspect { cert, json } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_inspect(&config, cert.as_deref(), json)
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            AppConfig::load_and_validate(path).context("failed to load configuration file")
        }
        None => Ok(AppConfig::default()),
    }
}

const DEFAULT_CONFIG: &str = r#"# x509saml configuration

[daemon]
log_level = "info"

[mapper]
# Subject RDN used as the display name (last value wins when repeated).
cert_name_attribute = "CN"
assertion_name_attribute = "displayName"
assertion_dn_attribute = "distinguishedName"
assertion_issuer_dn_attribute = "voPersonCertificateIssuerDN"
# Set to "" to leave the subject organization out.
assertion_o_attribute = "o"
assertion_assurance_attribute = "eduPersonAssurance"
parse_san_emails = true
parse_policy = true
# Split a "user@domain" token out of the display name into eduPersonPrincipalName.
export_eppn = false

[source]
header = "X-SSL-Client-Cert"
env_var = "SSL_CLIENT_CERT"

[web]
listen = "127.0.0.1:8080"
# base_url = "https://idp.example.org/"
"#;

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG).context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Adjust the attribute names under [mapper] to your federation's schema");
    println!("  2. Set [source] header to the header your TLS terminator forwards");
    println!("  3. Validate with: x509saml validate --config {}", output.display());
    println!("  4. Start the daemon: x509saml-daemon --config {}", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let m = &config.mapper;
    println!();
    println!("Configuration summary:");
    println!("  Name attribute  : {} -> {}", m.cert_name_attribute, m.assertion_name_attribute);
    println!("  DN attribute    : {}", m.assertion_dn_attribute);
    println!("  Issuer attribute: {}", m.assertion_issuer_dn_attribute);
    println!(
        "  Org attribute   : {}",
        m.assertion_o_attribute.as_deref().unwrap_or("disabled")
    );
    println!(
        "  Assurance       : {}",
        if m.parse_policy {
            m.assertion_assurance_attribute.as_str()
        } else {
            "disabled"
        }
    );
    println!("  SAN emails      : {}", enabled(m.parse_san_emails));
    println!("  Export eppn     : {}", enabled(m.export_eppn));
    println!("  Cert header     : {}", config.source.header);
    println!("  Cert env var    : {}", config.source.env_var);
    println!("  Web listen      : {}", config.web.listen);
    println!(
        "  Base URL        : {}",
        config.web.base_url.as_deref().unwrap_or("derived from request")
    );
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

fn cmd_map(config: &AppConfig, cert: Option<&Path>, json: bool) -> Result<()> {
    let source = CertSource::select(cert, &config.source.env_var);
    let presented = input::read_certificate(&source)?;
    let mapper = AttributeMapper::new(config.mapper.clone());

    match mapper.map(&presented) {
        MapperOutcome::Success {
            subject_id,
            attributes,
        } => {
            if json {
                let out = serde_json::json!({
                    "subject_id": subject_id,
                    "attributes": attributes,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!("{}", style::header("Certificate attributes"));
            println!(
                "  Subject: {}",
                subject_id.as_deref().unwrap_or("(none)")
            );
            println!();

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Attribute", "Values"]);
            for (name, values) in attributes.iter() {
                let rendered = if values.is_empty() {
                    style::dim("(empty)")
                } else {
                    values.join("\n")
                };
                table.add_row(vec![Cell::new(name), Cell::new(rendered)]);
            }
            println!("{table}");
            Ok(())
        }
        MapperOutcome::Failure(kind) => {
            if json {
                let out = serde_json::json!({
                    "errorcode": kind.code(),
                    "message": describe(kind),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            if let PresentedCertificate::Invalid(reason) = &presented {
                eprintln!("{}", style::warn(reason));
            }
            anyhow::bail!("{} ({}): read from {}", kind, describe(kind), source.describe())
        }
    }
}

fn cmd_inspect(config: &AppConfig, cert: Option<&Path>, json: bool) -> Result<()> {
    let source = CertSource::select(cert, &config.source.env_var);
    let record = match input::read_certificate(&source)? {
        PresentedCertificate::Parsed(record) => record,
        PresentedCertificate::Missing => {
            anyhow::bail!("no certificate presented via {}", source.describe())
        }
        PresentedCertificate::Invalid(reason) => {
            anyhow::bail!("invalid certificate from {}: {}", source.describe(), reason)
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("{}", style::header("Certificate"));
    println!("  Subject name: {}", record.subject_name.as_deref().unwrap_or("(none)"));
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Section", "Field", "Value"]);
    for (section, field, value) in record_rows(&record) {
        table.add_row(vec![Cell::new(section), Cell::new(field), Cell::new(value)]);
    }
    println!("{table}");

    Ok(())
}

/// Flatten a record into `(section, field, value)` rows, one per value.
fn record_rows(record: &CertificateRecord) -> Vec<(&'static str, String, String)> {
    let mut rows = Vec::new();
    for (key, values) in record.subject.iter() {
        for value in values {
            rows.push(("subject", key.to_string(), value.clone()));
        }
    }
    match &record.issuer {
        IssuerName::Structured(rdns) => {
            for (key, values) in rdns.iter() {
                for value in values {
                    rows.push(("issuer", key.to_string(), value.clone()));
                }
            }
        }
        IssuerName::Flat(dn) => rows.push(("issuer", "dn".to_string(), dn.clone())),
    }
    for (name, value) in &record.extensions {
        match value {
            ExtensionValue::Scalar(text) => {
                for line in text.lines() {
                    rows.push(("extension", name.clone(), line.to_string()));
                }
            }
            ExtensionValue::Sequence(entries) => {
                for entry in entries {
                    rows.push(("extension", name.clone(), entry.clone()));
                }
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_default_config_template_is_valid() {
        let config = AppConfig::from_toml_str(DEFAULT_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.mapper, AppConfig::default().mapper);
        assert_eq!(config.source.header, "X-SSL-Client-Cert");
        assert!(config.web.base_url.is_none());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x509saml.toml");
        cmd_init(&path).unwrap();
        assert!(path.exists());

        let err = cmd_init(&path).unwrap_err();
        assert!(err.to_string().contains("file already exists"));
    }

    #[test]
    fn test_validate_generated_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x509saml.toml");
        cmd_init(&path).unwrap();
        cmd_validate(&path).unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[mapper]\nassertion_dn_attribute = \"\"\n").unwrap();
        assert!(cmd_validate(&path).is_err());
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.mapper.cert_name_attribute, "CN");
    }

    #[test]
    fn test_record_rows() {
        let record = CertificateRecord {
            subject: [("CN", "a"), ("CN", "b")].into_iter().collect(),
            issuer: IssuerName::Flat("CN=CA".into()),
            subject_name: Some("/CN=a/CN=b".into()),
            extensions: [(
                "certificatePolicies".to_string(),
                ExtensionValue::Scalar("Policy: 1.2\nPolicy: 3.4".into()),
            )]
            .into_iter()
            .collect(),
        };
        let rows = record_rows(&record);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1], ("subject", "CN".to_string(), "b".to_string()));
        assert_eq!(rows[2], ("issuer", "dn".to_string(), "CN=CA".to_string()));
        assert_eq!(rows[4].2, "Policy: 3.4");
    }
}
