//! Reading the certificate to map from a file, stdin or the environment.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use x509saml_core::models::PresentedCertificate;

/// DER encodings start with a SEQUENCE tag; PEM and base64 never do.
const DER_SEQUENCE_TAG: u8 = 0x30;

/// Where the certificate comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertSource<'a> {
    Stdin,
    File(&'a Path),
    Env(&'a str),
}

impl<'a> CertSource<'a> {
    /// `-` selects stdin, any other path a file, and no path the environment.
    pub fn select(cert: Option<&'a Path>, env_var: &'a str) -> Self {
        match cert {
            Some(path) if path == Path::new("-") => Self::Stdin,
            Some(path) => Self::File(path),
            None => Self::Env(env_var),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Stdin => "stdin".to_string(),
            Self::File(path) => path.display().to_string(),
            Self::Env(var) => format!("${var}"),
        }
    }
}

/// Read and classify the certificate.
///
/// I/O failures are errors; an absent or unparseable certificate is an
/// outcome the mapper reports on.
pub fn read_certificate(source: &CertSource<'_>) -> Result<PresentedCertificate> {
    debug!(source = %source.describe(), "reading certificate");
    let bytes = match source {
        CertSource::Stdin => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read certificate from stdin")?;
            buf
        }
        CertSource::File(path) => std::fs::read(path)
            .with_context(|| format!("failed to read certificate file {}", path.display()))?,
        CertSource::Env(var) => {
            let raw = std::env::var(var).ok();
            return Ok(PresentedCertificate::from_raw(raw.as_deref()));
        }
    };
    Ok(classify(&bytes))
}

fn classify(bytes: &[u8]) -> PresentedCertificate {
    if bytes.first() == Some(&DER_SEQUENCE_TAG) {
        return PresentedCertificate::from_der(bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => PresentedCertificate::from_raw(Some(text)),
        Err(e) => PresentedCertificate::Invalid(format!("certificate is neither DER nor text: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
    use tempfile::TempDir;

    fn make_cert() -> rcgen::Certificate {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "cli test");
        params.distinguished_name = dn;
        let key_pair = KeyPair::generate().expect("key generation failed");
        params.self_signed(&key_pair).expect("rcgen cert generation failed")
    }

    #[test]
    fn test_select_source() {
        assert_eq!(CertSource::select(Some(Path::new("-")), "X"), CertSource::Stdin);
        assert_eq!(
            CertSource::select(Some(Path::new("a.pem")), "X"),
            CertSource::File(Path::new("a.pem"))
        );
        assert_eq!(CertSource::select(None, "X"), CertSource::Env("X"));
        assert_eq!(CertSource::Env("SSL_CLIENT_CERT").describe(), "$SSL_CLIENT_CERT");
    }

    #[test]
    fn test_read_pem_and_der_files() {
        let cert = make_cert();
        let tmp = TempDir::new().unwrap();
        let pem_path = tmp.path().join("client.pem");
        let der_path = tmp.path().join("client.der");
        std::fs::write(&pem_path, cert.pem()).unwrap();
        std::fs::write(&der_path, cert.der()).unwrap();

        let from_pem = read_certificate(&CertSource::File(&pem_path)).unwrap();
        let from_der = read_certificate(&CertSource::File(&der_path)).unwrap();
        assert!(matches!(from_pem, PresentedCertificate::Parsed(_)));
        assert_eq!(from_pem, from_der);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.pem");
        let err = read_certificate(&CertSource::File(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read certificate file"));
    }

    #[test]
    fn test_empty_file_is_missing_certificate() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.pem");
        std::fs::write(&path, "").unwrap();
        let presented = read_certificate(&CertSource::File(&path)).unwrap();
        assert_eq!(presented, PresentedCertificate::Missing);
    }

    #[test]
    fn test_binary_garbage_is_invalid() {
        assert!(matches!(classify(&[0xff, 0xfe, 0x00]), PresentedCertificate::Invalid(_)));
        assert!(matches!(classify(&[0x30, 0x03, 0x01]), PresentedCertificate::Invalid(_)));
    }
}
