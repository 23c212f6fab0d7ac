//! Client certificate intake: transport decoding and X.509 parsing.
//!
//! This is the collaborator that turns whatever the terminating server
//! handed over into a [`PresentedCertificate`] for the attribute mapper.

pub mod parser;
pub mod source;

use tracing::{debug, error};

use crate::errors::CertificateError;
use crate::models::{CertificateRecord, PresentedCertificate};

pub use parser::parse_der;
pub use source::decode_presented;

/// Decode and parse a raw transport value into a [`CertificateRecord`].
///
/// Returns `Ok(None)` when no certificate was presented.
pub fn parse_presented(raw: Option<&str>) -> Result<Option<CertificateRecord>, CertificateError> {
    decode_presented(raw)?.map(|der| parse_der(&der)).transpose()
}

impl PresentedCertificate {
    /// Classify a raw transport value (header or environment variable).
    pub fn from_raw(raw: Option<&str>) -> Self {
        match parse_presented(raw) {
            Ok(Some(record)) => Self::Parsed(record),
            Ok(None) => {
                debug!("no client certificate presented");
                Self::Missing
            }
            Err(e) => {
                error!(error = %e, "invalid client certificate");
                Self::Invalid(e.to_string())
            }
        }
    }

    /// Classify DER bytes read from a file or a TLS stack.
    pub fn from_der(der: &[u8]) -> Self {
        match parse_der(der) {
            Ok(record) => Self::Parsed(record),
            Err(e) => {
                error!(error = %e, "invalid client certificate");
                Self::Invalid(e.to_string())
            }
        }
    }
}
