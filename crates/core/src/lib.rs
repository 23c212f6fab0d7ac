//! x509saml core library.
//!
//! This crate turns X.509 client certificates into SAML assertion
//! attributes: certificate decoding and parsing, the attribute mapper,
//! configuration, and diagnostic error reports for failed authentications.

pub mod certificate;
pub mod config;
pub mod error_report;
pub mod errors;
pub mod mapper;
pub mod models;

// Re-exports for convenience.
pub use config::{AppConfig, MapperConfig};
pub use error_report::{ErrorReport, RequestContext};
pub use errors::{CertificateError, ConfigError};
pub use mapper::AttributeMapper;
pub use models::{AttributeSet, CertificateRecord, ErrorKind, MapperOutcome, PresentedCertificate};
