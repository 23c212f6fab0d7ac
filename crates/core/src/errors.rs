//! Error types for the x509saml core library.
//!
//! Each subsystem has its own error type derived with `thiserror`. Binaries
//! wrap them with `anyhow` context at the call site.
//!
//! These are infrastructure errors. The two failure kinds an authentication
//! attempt can end in live in [`crate::models::ErrorKind`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Certificate errors
// ---------------------------------------------------------------------------

/// Errors from decoding and parsing a presented client certificate.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// The transport value was percent-encoded but did not decode to UTF-8.
    #[error("certificate URL decoding failed: {0}")]
    UrlDecode(String),

    /// PEM armor was opened but never closed.
    #[error("certificate PEM armor is incomplete: missing '{0}'")]
    UnterminatedPem(&'static str),

    /// The PEM body (or bare blob) is not valid base64.
    #[error("certificate base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The DER bytes are not a valid X.509 certificate.
    #[error("certificate is not valid X.509: {0}")]
    X509(String),

    /// Valid X.509 followed by unexpected bytes.
    #[error("certificate has {0} trailing bytes after the DER structure")]
    TrailingData(usize),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
