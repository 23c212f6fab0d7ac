//! Decoding of the certificate value handed over by the terminating server.
//!
//! Accepted shapes:
//! - PEM with normal line breaks (Apache `SSL_CLIENT_CERT`)
//! - PEM whose newlines were folded into spaces by a header rewrite
//! - percent-encoded PEM (nginx `$ssl_client_escaped_cert`)
//! - a bare base64 DER blob

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::CertificateError;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Values some servers substitute when no certificate was presented.
const ABSENT_MARKERS: &[&str] = &["", "(null)"];

/// Turn the raw transport value into DER bytes.
///
/// Returns `Ok(None)` when no certificate was presented.
pub fn decode_presented(raw: Option<&str>) -> Result<Option<Vec<u8>>, CertificateError> {
    let raw = match raw.map(str::trim) {
        Some(value) if !ABSENT_MARKERS.contains(&value) => value,
        _ => return Ok(None),
    };

    // base64 never contains '%', so its presence means the value was escaped.
    let text: Cow<'_, str> = if raw.contains('%') {
        urlencoding::decode(raw).map_err(|e| CertificateError::UrlDecode(e.to_string()))?
    } else {
        Cow::Borrowed(raw)
    };

    let body = match pem_body(&text)? {
        Some(body) => body,
        None => text.as_ref(),
    };

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let der = STANDARD.decode(compact.as_bytes())?;
    Ok(Some(der))
}

/// The base64 body between the first PEM BEGIN/END markers, if armored.
fn pem_body(text: &str) -> Result<Option<&str>, CertificateError> {
    let Some(start) = text.find(PEM_BEGIN) else {
        return Ok(None);
    };
    let rest = &text[start + PEM_BEGIN.len()..];
    let end = rest
        .find(PEM_END)
        .ok_or(CertificateError::UnterminatedPem(PEM_END))?;
    Ok(Some(&rest[..end]))
}
