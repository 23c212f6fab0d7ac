//! Domain model types used throughout x509saml.
//!
//! These types bridge the certificate parser, the attribute mapper, the web
//! surface, and the CLI.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Extension key under which Subject Alternative Names are stored.
pub const EXT_SUBJECT_ALT_NAME: &str = "subjectAltName";

/// Extension key under which certificate policies are stored.
pub const EXT_CERTIFICATE_POLICIES: &str = "certificatePolicies";

// ---------------------------------------------------------------------------
// Distinguished names
// ---------------------------------------------------------------------------

/// Ordered mapping from RDN short name (`CN`, `O`, ...) to its values.
///
/// A repeated RDN appends to the sequence at the key's first position, so
/// every present key holds at least one value and the last value is the one
/// that appeared latest in the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdnMap {
    entries: Vec<(String, Vec<String>)>,
}

impl RdnMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `key`, creating the entry if needed.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// All values recorded for `key`, in certificate order.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    /// The last value for `key` (later components override earlier ones).
    pub fn last(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|values| values.last()).map(String::as_str)
    }

    /// The value for `key` if it appears exactly once.
    pub fn single(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some([value]) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `/key=value` segments, one segment per value, keys in
    /// insertion order.
    pub fn to_slash_dn(&self) -> String {
        let mut dn = String::new();
        for (key, values) in &self.entries {
            for value in values {
                dn.push('/');
                dn.push_str(key);
                dn.push('=');
                dn.push_str(value);
            }
        }
        dn
    }
}

impl<K, V> FromIterator<(K, V)> for RdnMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = RdnMap::new();
        for (key, value) in iter {
            map.push(key, value);
        }
        map
    }
}

impl Serialize for RdnMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in &self.entries {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

/// Issuer of a certificate: either structured components or a flat DN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IssuerName {
    Structured(RdnMap),
    Flat(String),
}

impl IssuerName {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured(rdns) => rdns.is_empty(),
            Self::Flat(dn) => dn.is_empty(),
        }
    }
}

impl Default for IssuerName {
    fn default() -> Self {
        Self::Structured(RdnMap::new())
    }
}

// ---------------------------------------------------------------------------
// Certificate record
// ---------------------------------------------------------------------------

/// Value of a decoded extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Scalar(String),
    Sequence(Vec<String>),
}

/// The fields of a parsed X.509 certificate that attribute mapping reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CertificateRecord {
    /// Subject RDNs keyed by short name.
    pub subject: RdnMap,
    /// Issuer DN.
    pub issuer: IssuerName,
    /// Raw one-line subject DN (`/C=US/O=Example/CN=Jane Doe`).
    pub subject_name: Option<String>,
    /// Decoded extensions keyed by name (`subjectAltName`, ...).
    pub extensions: BTreeMap<String, ExtensionValue>,
}

impl CertificateRecord {
    pub fn extension(&self, name: &str) -> Option<&ExtensionValue> {
        self.extensions.get(name)
    }
}

/// What the transport layer handed over for one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedCertificate {
    /// No client certificate was presented.
    Missing,
    /// A certificate was presented but could not be parsed.
    Invalid(String),
    /// A successfully parsed certificate.
    Parsed(CertificateRecord),
}

// ---------------------------------------------------------------------------
// Attribute set
// ---------------------------------------------------------------------------

/// Ordered mapping from assertion attribute name to its values.
///
/// Keys are unique. Assigning an existing key replaces its values but keeps
/// its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    entries: Vec<(String, Vec<String>)>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `values`, replacing any previous values in place.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((name, values)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Attribute names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for AttributeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, values) in &self.entries {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Mapper outcome
// ---------------------------------------------------------------------------

/// Why an authentication attempt could not produce attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// No client certificate was presented to the server.
    #[serde(rename = "NOCERT")]
    NoCertificate,
    /// A certificate was presented but is not valid X.509.
    #[serde(rename = "INVALIDCERT")]
    InvalidCertificate,
}

impl ErrorKind {
    /// Stable error code handed to the error-report view.
    pub fn code(self) -> &'static str {
        match self {
            Self::NoCertificate => "NOCERT",
            Self::InvalidCertificate => "INVALIDCERT",
        }
    }

    /// Parse an error code back into a kind.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "NOCERT" => Some(Self::NoCertificate),
            "INVALIDCERT" => Some(Self::InvalidCertificate),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of one attribute-mapping invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapperOutcome {
    Success {
        /// Raw subject DN, when the certificate exposes one.
        subject_id: Option<String>,
        attributes: AttributeSet,
    },
    Failure(ErrorKind),
}

impl MapperOutcome {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failure(kind) => Some(*kind),
            Self::Success { .. } => None,
        }
    }

    pub fn attributes(&self) -> Option<&AttributeSet> {
        match self {
            Self::Success { attributes, .. } => Some(attributes),
            Self::Failure(_) => None,
        }
    }
}
