//! Certificate-to-assertion attribute mapping.
//!
//! [`AttributeMapper`] turns a parsed client certificate into the flat
//! attribute set embedded in a SAML assertion. It is stateless and does no
//! I/O or logging, so one instance can be shared across request handlers.
//!
//! Processing order (which is also the attribute order of the result):
//! 1. Subject DN
//! 2. Display name (and `eduPersonPrincipalName` when enabled)
//! 3. Issuer DN
//! 4. SAN email addresses
//! 5. Subject organization
//! 6. Certificate policy OIDs

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::config::MapperConfig;
use crate::models::{
    AttributeSet, CertificateRecord, ErrorKind, ExtensionValue, IssuerName, MapperOutcome,
    PresentedCertificate, EXT_CERTIFICATE_POLICIES, EXT_SUBJECT_ALT_NAME,
};

/// Output attribute for a principal name split out of the display name.
pub const EPPN_ATTRIBUTE: &str = "eduPersonPrincipalName";

/// Output attribute for SAN email addresses.
pub const MAIL_ATTRIBUTE: &str = "mail";

const SAN_EMAIL_PREFIX: &str = "email:";

fn policy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Policy: ([0-9.]+)").expect("policy pattern is valid"))
}

/// Maps certificate fields to assertion attributes under a fixed config.
#[derive(Debug, Clone)]
pub struct AttributeMapper {
    config: MapperConfig,
}

impl AttributeMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Map one authentication attempt to its outcome.
    pub fn map(&self, presented: &PresentedCertificate) -> MapperOutcome {
        match presented {
            PresentedCertificate::Missing => MapperOutcome::Failure(ErrorKind::NoCertificate),
            PresentedCertificate::Invalid(_) => {
                MapperOutcome::Failure(ErrorKind::InvalidCertificate)
            }
            PresentedCertificate::Parsed(record) => self.map_record(record),
        }
    }

    /// Map a successfully parsed certificate.
    pub fn map_record(&self, record: &CertificateRecord) -> MapperOutcome {
        let mut attributes = AttributeSet::new();

        let subject_id = record.subject_name.clone();
        if let Some(dn) = &record.subject_name {
            attributes.insert(&self.config.assertion_dn_attribute, vec![dn.clone()]);
        }

        self.map_display_name(record, &mut attributes);
        self.map_issuer(record, &mut attributes);
        if self.config.parse_san_emails {
            map_san_emails(record, &mut attributes);
        }
        self.map_organization(record, &mut attributes);
        if self.config.parse_policy {
            self.map_policies(record, &mut attributes);
        }

        MapperOutcome::Success {
            subject_id,
            attributes,
        }
    }

    fn map_display_name(&self, record: &CertificateRecord, attributes: &mut AttributeSet) {
        let Some(name) = record.subject.last(&self.config.cert_name_attribute) else {
            return;
        };

        let display_name = match self.config.export_eppn.then(|| split_eppn(name)).flatten() {
            Some((eppn, remaining)) => {
                attributes.insert(EPPN_ATTRIBUTE, vec![eppn]);
                remaining
            }
            None => name.to_string(),
        };
        attributes.insert(&self.config.assertion_name_attribute, vec![display_name]);
    }

    fn map_issuer(&self, record: &CertificateRecord, attributes: &mut AttributeSet) {
        if record.issuer.is_empty() {
            return;
        }
        let issuer_dn = match &record.issuer {
            IssuerName::Structured(rdns) => rdns.to_slash_dn(),
            IssuerName::Flat(dn) => dn.clone(),
        };
        attributes.insert(&self.config.assertion_issuer_dn_attribute, vec![issuer_dn]);
    }

    fn map_organization(&self, record: &CertificateRecord, attributes: &mut AttributeSet) {
        let Some(attribute) = &self.config.assertion_o_attribute else {
            return;
        };
        if let Some(org) = record.subject.single("O").filter(|o| !o.is_empty()) {
            attributes.insert(attribute, vec![org.to_string()]);
        }
    }

    fn map_policies(&self, record: &CertificateRecord, attributes: &mut AttributeSet) {
        let Some(ExtensionValue::Scalar(text)) = record.extension(EXT_CERTIFICATE_POLICIES) else {
            return;
        };
        let oids = policy_oids(text);
        if !oids.is_empty() {
            attributes.insert(&self.config.assertion_assurance_attribute, oids);
        }
    }
}

/// `mail` is always present when SAN parsing is on, even if empty.
fn map_san_emails(record: &CertificateRecord, attributes: &mut AttributeSet) {
    let emails = match record.extension(EXT_SUBJECT_ALT_NAME) {
        Some(ExtensionValue::Scalar(entry)) => strip_email(entry).into_iter().collect(),
        Some(ExtensionValue::Sequence(entries)) => {
            entries.iter().filter_map(|e| strip_email(e)).collect()
        }
        None => Vec::new(),
    };
    attributes.insert(MAIL_ATTRIBUTE, emails);
}

fn strip_email(entry: &str) -> Option<String> {
    entry.strip_prefix(SAN_EMAIL_PREFIX).map(str::to_owned)
}

/// Split the first whitespace-delimited token containing `@` out of `name`.
///
/// Returns the token and `name` with the first textual occurrence of the
/// token removed. Surrounding whitespace is left untouched.
pub fn split_eppn(name: &str) -> Option<(String, String)> {
    let token = name.split_whitespace().find(|t| t.contains('@'))?;
    Some((token.to_string(), name.replacen(token, "", 1)))
}

/// Every `Policy: <oid>` OID in `text`, in textual order.
pub fn policy_oids(text: &str) -> Vec<String> {
    policy_pattern()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// One-shot convenience wrapper around [`AttributeMapper::map`].
pub fn map(presented: &PresentedCertificate, config: &MapperConfig) -> MapperOutcome {
    AttributeMapper::new(config.clone()).map(presented)
}
