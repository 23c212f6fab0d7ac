//! TOML-based configuration system for x509saml.
//!
//! Every section has serde defaults, so an empty file yields a working
//! configuration that mirrors the stock attribute names.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon / logging settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Attribute mapping settings.
    #[serde(default)]
    pub mapper: MapperConfig,

    /// Where the client certificate is read from.
    #[serde(default)]
    pub source: SourceConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub web: WebConfig,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mapper
// ---------------------------------------------------------------------------

/// Attribute mapping configuration.
///
/// Resolved once at load time; the mapper never consults the raw file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Subject RDN that supplies the display name.
    #[serde(default = "default_cert_name_attribute")]
    pub cert_name_attribute: String,

    /// Output attribute for the display name.
    #[serde(default = "default_assertion_name_attribute")]
    pub assertion_name_attribute: String,

    /// Output attribute for the full subject DN.
    #[serde(default = "default_assertion_dn_attribute")]
    pub assertion_dn_attribute: String,

    /// Output attribute for the issuer DN.
    #[serde(default = "default_assertion_issuer_dn_attribute")]
    pub assertion_issuer_dn_attribute: String,

    /// Output attribute for the subject organization. `None` when configured
    /// as an empty string or a non-string value.
    #[serde(
        default = "default_assertion_o_attribute",
        deserialize_with = "deserialize_optional_attribute",
        serialize_with = "serialize_optional_attribute"
    )]
    pub assertion_o_attribute: Option<String>,

    /// Output attribute for certificate policy OIDs.
    #[serde(default = "default_assertion_assurance_attribute")]
    pub assertion_assurance_attribute: String,

    /// Extract email addresses from the Subject Alternative Name.
    #[serde(default = "default_true")]
    pub parse_san_emails: bool,

    /// Extract certificate policy OIDs.
    #[serde(default = "default_true")]
    pub parse_policy: bool,

    /// Split an embedded `user@realm` token out of the display name.
    #[serde(default)]
    pub export_eppn: bool,
}

fn default_cert_name_attribute() -> String {
    "CN".into()
}
fn default_assertion_name_attribute() -> String {
    "displayName".into()
}
fn default_assertion_dn_attribute() -> String {
    "distinguishedName".into()
}
fn default_assertion_issuer_dn_attribute() -> String {
    "voPersonCertificateIssuerDN".into()
}
fn default_assertion_o_attribute() -> Option<String> {
    Some("o".into())
}
fn default_assertion_assurance_attribute() -> String {
    "eduPersonAssurance".into()
}
fn default_true() -> bool {
    true
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            cert_name_attribute: default_cert_name_attribute(),
            assertion_name_attribute: default_assertion_name_attribute(),
            assertion_dn_attribute: default_assertion_dn_attribute(),
            assertion_issuer_dn_attribute: default_assertion_issuer_dn_attribute(),
            assertion_o_attribute: default_assertion_o_attribute(),
            assertion_assurance_attribute: default_assertion_assurance_attribute(),
            parse_san_emails: true,
            parse_policy: true,
            export_eppn: false,
        }
    }
}

/// Accept a non-empty string as an attribute name; anything else (empty
/// string, `false`, a number) disables the attribute.
fn deserialize_optional_attribute<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Name(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Name(name) if !name.is_empty() => Some(name),
        Raw::Name(_) | Raw::Other(_) => None,
    })
}

/// A disabled attribute is written back as an empty string.
fn serialize_optional_attribute<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

// ---------------------------------------------------------------------------
// Certificate source
// ---------------------------------------------------------------------------

/// Where the terminating server hands over the client certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Request header carrying the PEM certificate (reverse-proxy setups).
    #[serde(default = "default_header")]
    pub header: String,

    /// Environment variable carrying the PEM certificate (CGI-style setups
    /// and the CLI).
    #[serde(default = "default_env_var")]
    pub env_var: String,
}

fn default_header() -> String {
    "X-SSL-Client-Cert".into()
}
fn default_env_var() -> String {
    "SSL_CLIENT_CERT".into()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            header: default_header(),
            env_var: default_env_var(),
        }
    }
}

// ---------------------------------------------------------------------------
// Web
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen address (default `127.0.0.1:8080`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Public base URL reported on error pages. Derived from the request
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_listen() -> String {
    "127.0.0.1:8080".into()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            base_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Parse an [`AppConfig`] from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate that all attribute names and listener settings are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.mapper;
        let required = [
            ("mapper.cert_name_attribute", &m.cert_name_attribute),
            ("mapper.assertion_name_attribute", &m.assertion_name_attribute),
            ("mapper.assertion_dn_attribute", &m.assertion_dn_attribute),
            (
                "mapper.assertion_issuer_dn_attribute",
                &m.assertion_issuer_dn_attribute,
            ),
            (
                "mapper.assertion_assurance_attribute",
                &m.assertion_assurance_attribute,
            ),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: "attribute name must not be empty".into(),
                });
            }
        }

        if !is_valid_header_name(&self.source.header) {
            return Err(ConfigError::InvalidValue {
                field: "source.header".into(),
                detail: format!("'{}' is not a valid HTTP header name", self.source.header),
            });
        }

        if self.web.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "web.listen".into(),
                detail: format!("'{}' is not a socket address", self.web.listen),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// RFC 7230 token characters.
fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[daemon]
log_level = "debug"

[mapper]
cert_name_attribute = "UID"
assertion_name_attribute = "cn"
assertion_dn_attribute = "subjectDN"
assertion_issuer_dn_attribute = "issuerDN"
assertion_o_attribute = "organizationName"
assertion_assurance_attribute = "assurance"
parse_san_emails = false
parse_policy = false
export_eppn = true

[source]
header = "X-Client-Cert"
env_var = "CLIENT_CERT"

[web]
listen = "0.0.0.0:9443"
base_url = "https://idp.example.org/"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.mapper.cert_name_attribute, "UID");
        assert_eq!(
            config.mapper.assertion_o_attribute.as_deref(),
            Some("organizationName")
        );
        assert!(!config.mapper.parse_san_emails);
        assert!(config.mapper.export_eppn);
        assert_eq!(config.source.header, "X-Client-Cert");
        assert_eq!(config.web.base_url.as_deref(), Some("https://idp.example.org/"));
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.mapper, MapperConfig::default());
        assert_eq!(config.mapper.cert_name_attribute, "CN");
        assert_eq!(config.mapper.assertion_name_attribute, "displayName");
        assert_eq!(config.mapper.assertion_dn_attribute, "distinguishedName");
        assert_eq!(
            config.mapper.assertion_issuer_dn_attribute,
            "voPersonCertificateIssuerDN"
        );
        assert_eq!(config.mapper.assertion_o_attribute.as_deref(), Some("o"));
        assert_eq!(
            config.mapper.assertion_assurance_attribute,
            "eduPersonAssurance"
        );
        assert!(config.mapper.parse_san_emails);
        assert!(config.mapper.parse_policy);
        assert!(!config.mapper.export_eppn);
        assert_eq!(config.source.header, "X-SSL-Client-Cert");
        assert_eq!(config.source.env_var, "SSL_CLIENT_CERT");
        assert_eq!(config.web.listen, "127.0.0.1:8080");
        assert_eq!(config.daemon.log_level, "info");
    }

    #[test]
    fn test_o_attribute_disabled_by_empty_string() {
        let config = AppConfig::from_toml_str("[mapper]\nassertion_o_attribute = \"\"\n").unwrap();
        assert_eq!(config.mapper.assertion_o_attribute, None);
    }

    #[test]
    fn test_o_attribute_disabled_by_non_string() {
        let config =
            AppConfig::from_toml_str("[mapper]\nassertion_o_attribute = false\n").unwrap();
        assert_eq!(config.mapper.assertion_o_attribute, None);

        let config = AppConfig::from_toml_str("[mapper]\nassertion_o_attribute = 7\n").unwrap();
        assert_eq!(config.mapper.assertion_o_attribute, None);
    }

    #[test]
    fn test_disabled_o_attribute_survives_round_trip() {
        let mut config = AppConfig::default();
        config.mapper.assertion_o_attribute = None;
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("assertion_o_attribute = \"\""));
        let reparsed = AppConfig::from_toml_str(&text).unwrap();
        assert_eq!(reparsed.mapper.assertion_o_attribute, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_and_validate(&path).expect("load_and_validate failed");
        assert_eq!(config.web.listen, "0.0.0.0:9443");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/x509saml.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = AppConfig::from_toml_str("[mapper]\nparse_policy = \"yes\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_empty_attribute_name() {
        let mut config = AppConfig::default();
        config.mapper.assertion_name_attribute = "  ".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "mapper.assertion_name_attribute"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_header() {
        let mut config = AppConfig::default();
        config.source.header = "X SSL Cert".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "source.header"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_listen() {
        let mut config = AppConfig::default();
        config.web.listen = "localhost".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "web.listen"
        ));
    }
}
