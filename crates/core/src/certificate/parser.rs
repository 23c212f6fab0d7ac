//! X.509 parsing into a [`CertificateRecord`].
//!
//! Names use OpenSSL short names and Subject Alternative Name entries use
//! OpenSSL's `type:value` labels, so attribute values match what operators
//! see in `openssl x509 -text`.

use std::collections::BTreeMap;

use tracing::debug;
use x509_parser::asn1_rs::{Any, BmpString, Tag, UniversalString};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;
use x509_parser::x509::X509Name;

use crate::errors::CertificateError;
use crate::models::{
    CertificateRecord, ExtensionValue, IssuerName, RdnMap, EXT_CERTIFICATE_POLICIES,
    EXT_SUBJECT_ALT_NAME,
};

/// Parse DER bytes into a [`CertificateRecord`].
pub fn parse_der(der: &[u8]) -> Result<CertificateRecord, CertificateError> {
    let (rest, cert) =
        X509Certificate::from_der(der).map_err(|e| CertificateError::X509(e.to_string()))?;
    if !rest.is_empty() {
        return Err(CertificateError::TrailingData(rest.len()));
    }

    let record = CertificateRecord {
        subject: rdn_map(cert.subject()),
        issuer: IssuerName::Structured(rdn_map(cert.issuer())),
        subject_name: Some(one_line(cert.subject())),
        extensions: extensions(&cert),
    };

    debug!(
        subject = ?record.subject_name,
        extensions = record.extensions.len(),
        "parsed certificate"
    );
    Ok(record)
}

/// OpenSSL short name for a well-known attribute type OID.
pub fn short_name(oid: &str) -> Option<&'static str> {
    let name = match oid {
        "2.5.4.3" => "CN",
        "2.5.4.4" => "SN",
        "2.5.4.5" => "serialNumber",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.9" => "street",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "2.5.4.12" => "title",
        "2.5.4.17" => "postalCode",
        "2.5.4.42" => "GN",
        "2.5.4.43" => "initials",
        "2.5.4.44" => "generationQualifier",
        "2.5.4.46" => "dnQualifier",
        "2.5.4.65" => "pseudonym",
        "1.2.840.113549.1.9.1" => "emailAddress",
        "0.9.2342.19200300.100.1.1" => "UID",
        "0.9.2342.19200300.100.1.25" => "DC",
        _ => return None,
    };
    Some(name)
}

fn attribute_pairs(name: &X509Name<'_>) -> Vec<Vec<(String, String)>> {
    name.iter()
        .map(|rdn| {
            rdn.iter()
                .map(|attr| {
                    let oid = attr.attr_type().to_id_string();
                    let key = short_name(&oid).map(str::to_owned).unwrap_or(oid);
                    (key, attribute_value(attr.attr_value()))
                })
                .collect()
        })
        .collect()
}

/// Decode a name attribute value by its string tag.
///
/// BMPString is UTF-16BE and UniversalString is UTF-32BE. The other string
/// types are read as UTF-8. Unknown tags and malformed strings fall back to
/// a lossy view of the raw bytes.
fn attribute_value(value: &Any<'_>) -> String {
    let decoded = match value.tag() {
        Tag::BmpString => BmpString::try_from(value).ok().map(|s| s.string()),
        Tag::UniversalString => UniversalString::try_from(value).ok().map(|s| s.string()),
        Tag::NumericString
        | Tag::PrintableString
        | Tag::Utf8String
        | Tag::Ia5String
        | Tag::VisibleString
        | Tag::GeneralString
        | Tag::GraphicString
        | Tag::T61String
        | Tag::VideotexString => std::str::from_utf8(value.as_bytes()).ok().map(str::to_owned),
        _ => None,
    };
    decoded.unwrap_or_else(|| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

fn rdn_map(name: &X509Name<'_>) -> RdnMap {
    attribute_pairs(name).into_iter().flatten().collect()
}

/// `/K=V/K=V` with `+` joining the members of a multi-valued RDN.
fn one_line(name: &X509Name<'_>) -> String {
    attribute_pairs(name)
        .into_iter()
        .map(|rdn| {
            let members: Vec<String> = rdn.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("/{}", members.join("+"))
        })
        .collect()
}

fn extensions(cert: &X509Certificate<'_>) -> BTreeMap<String, ExtensionValue> {
    let mut out = BTreeMap::new();
    for ext in cert.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                let entries = san.general_names.iter().filter_map(general_name).collect();
                out.insert(EXT_SUBJECT_ALT_NAME.to_string(), ExtensionValue::Sequence(entries));
            }
            ParsedExtension::CertificatePolicies(policies) => {
                let text = policies
                    .iter()
                    .map(|policy| format!("Policy: {}", policy.policy_id.to_id_string()))
                    .collect::<Vec<_>>()
                    .join("\n");
                out.insert(EXT_CERTIFICATE_POLICIES.to_string(), ExtensionValue::Scalar(text));
            }
            _ => {}
        }
    }
    out
}

fn general_name(name: &GeneralName<'_>) -> Option<String> {
    match name {
        GeneralName::RFC822Name(email) => Some(format!("email:{email}")),
        GeneralName::DNSName(dns) => Some(format!("DNS:{dns}")),
        GeneralName::URI(uri) => Some(format!("URI:{uri}")),
        GeneralName::IPAddress(ip) => Some(format!("IP Address:{}", format_ip(ip))),
        GeneralName::RegisteredID(oid) => Some(format!("Registered ID:{}", oid.to_id_string())),
        GeneralName::DirectoryName(dn) => Some(format!("DirName:{}", one_line(dn))),
        GeneralName::OtherName(oid, _) => Some(format!("othername:{}", oid.to_id_string())),
        _ => None,
    }
}

/// Dotted quad for IPv4, uncompressed upper-case hex groups for IPv6.
fn format_ip(ip: &[u8]) -> String {
    match ip.len() {
        4 => format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]),
        16 => ip
            .chunks(2)
            .map(|pair| format!("{:X}", u16::from_be_bytes([pair[0], pair[1]])))
            .collect::<Vec<_>>()
            .join(":"),
        _ => "<invalid>".to_string(),
    }
}
