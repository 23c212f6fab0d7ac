//! Diagnostic reports for failed certificate authentications.
//!
//! A report carries the error code, whatever parameters the caller attached,
//! and a fixed list of request-derived diagnostic items (host, scheme, URLs)
//! so an operator can see how the request reached the service.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::models::ErrorKind;

/// What the service knows about the request being reported on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Value of the `Host` header, possibly with a port.
    pub host: String,
    pub secure: bool,
    /// e.g. `HTTP/1.1`
    pub protocol: String,
    pub path: String,
    pub query: Option<String>,
    /// Configured public base URL, if any.
    pub base_url: Option<String>,
}

impl RequestContext {
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Host name without any port. IPv6 literals keep their brackets.
    pub fn self_host(&self) -> &str {
        split_host_port(&self.host).0
    }

    /// Host name, with the port appended only when it is not the scheme default.
    pub fn self_host_with_non_standard_port(&self) -> String {
        let (host, port) = split_host_port(&self.host);
        let default_port = if self.secure { 443 } else { 80 };
        match port {
            Some(p) if p != default_port => format!("{host}:{p}"),
            _ => host.to_string(),
        }
    }

    pub fn self_url_host(&self) -> String {
        format!("{}://{}", self.scheme(), self.self_host_with_non_standard_port())
    }

    pub fn self_url_no_query(&self) -> String {
        format!("{}{}", self.self_url_host(), self.path)
    }

    pub fn self_host_with_path(&self) -> String {
        format!("{}{}", self.self_host_with_non_standard_port(), self.path)
    }

    pub fn self_url(&self) -> String {
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => format!("{}?{q}", self.self_url_no_query()),
            _ => self.self_url_no_query(),
        }
    }

    pub fn base_url(&self) -> String {
        match self.base_url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}/", self.self_url_host()),
        }
    }
}

fn split_host_port(host: &str) -> (&str, Option<u16>) {
    if host.starts_with('[') {
        if let Some(end) = host.find(']') {
            let port = host[end + 1..].strip_prefix(':').and_then(|p| p.parse().ok());
            return (&host[..=end], port);
        }
        return (host, None);
    }
    match host.rsplit_once(':') {
        Some((name, port)) => match port.parse() {
            Ok(p) => (name, Some(p)),
            Err(_) => (host, None),
        },
        None => (host, None),
    }
}

/// Ordered list of named diagnostic values, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticItems(Vec<(&'static str, Vec<String>)>);

impl DiagnosticItems {
    pub fn from_request(ctx: &RequestContext) -> Self {
        let https = if ctx.secure {
            vec!["on".to_string()]
        } else {
            Vec::new()
        };
        Self(vec![
            ("http_host", vec![ctx.host.clone()]),
            ("https", https),
            ("server_protocol", vec![ctx.protocol.clone()]),
            ("base_url", vec![ctx.base_url()]),
            ("self_host", vec![ctx.self_host().to_string()]),
            (
                "self_host_with_non_standard_port",
                vec![ctx.self_host_with_non_standard_port()],
            ),
            ("self_url_host", vec![ctx.self_url_host()]),
            ("self_url_no_query", vec![ctx.self_url_no_query()]),
            ("self_host_with_path", vec![ctx.self_host_with_path()]),
            ("self_url", vec![ctx.self_url()]),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(n, _)| *n)
    }
}

impl Serialize for DiagnosticItems {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, values) in &self.0 {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

/// A rendered error report.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub report_id: Uuid,
    pub reported_at: DateTime<Utc>,
    pub errorcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub parameters: Map<String, Value>,
    pub items: DiagnosticItems,
}

impl ErrorReport {
    /// Build a report for an arbitrary error code, as posted to the
    /// error-report endpoint.
    pub fn new(errorcode: impl Into<String>, parameters: Map<String, Value>, ctx: &RequestContext) -> Self {
        let errorcode = errorcode.into();
        let message = ErrorKind::from_code(&errorcode).map(describe);
        Self {
            report_id: Uuid::new_v4(),
            reported_at: Utc::now(),
            errorcode,
            message,
            parameters,
            items: DiagnosticItems::from_request(ctx),
        }
    }

    pub fn for_kind(kind: ErrorKind, ctx: &RequestContext) -> Self {
        Self::new(kind.code(), Map::new(), ctx)
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(&self.errorcode)
    }

    /// Emit the report to the log so it can be correlated by id.
    pub fn log(&self) {
        warn!(
            report_id = %self.report_id,
            errorcode = %self.errorcode,
            host = self.items.get("http_host").and_then(|v| v.first()).map(String::as_str).unwrap_or(""),
            "authentication error reported"
        );
    }
}

/// Human-readable summary for a known failure kind.
pub fn describe(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NoCertificate => "No client certificate was presented",
        ErrorKind::InvalidCertificate => "The client certificate could not be parsed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(host: &str, secure: bool) -> RequestContext {
        RequestContext {
            host: host.into(),
            secure,
            protocol: "HTTP/1.1".into(),
            path: "/auth/x509".into(),
            query: Some("a=1".into()),
            base_url: None,
        }
    }

    #[test]
    fn test_standard_port_dropped() {
        assert_eq!(ctx("idp.example.org:443", true).self_host_with_non_standard_port(), "idp.example.org");
        assert_eq!(ctx("idp.example.org:80", false).self_host_with_non_standard_port(), "idp.example.org");
        assert_eq!(ctx("idp.example.org:443", false).self_host_with_non_standard_port(), "idp.example.org:443");
    }

    #[test]
    fn test_urls() {
        let c = ctx("idp.example.org:8443", true);
        assert_eq!(c.self_host(), "idp.example.org");
        assert_eq!(c.self_url_host(), "https://idp.example.org:8443");
        assert_eq!(c.self_url_no_query(), "https://idp.example.org:8443/auth/x509");
        assert_eq!(c.self_host_with_path(), "idp.example.org:8443/auth/x509");
        assert_eq!(c.self_url(), "https://idp.example.org:8443/auth/x509?a=1");
        assert_eq!(c.base_url(), "https://idp.example.org:8443/");
    }

    #[test]
    fn test_configured_base_url_wins() {
        let mut c = ctx("localhost:8080", false);
        c.base_url = Some("https://idp.example.org/".into());
        assert_eq!(c.base_url(), "https://idp.example.org/");
    }

    #[test]
    fn test_ipv6_host() {
        let c = ctx("[::1]:8080", false);
        assert_eq!(c.self_host(), "[::1]");
        assert_eq!(c.self_host_with_non_standard_port(), "[::1]:8080");
        assert_eq!(ctx("[::1]", false).self_host(), "[::1]");
    }

    #[test]
    fn test_https_item_empty_when_insecure() {
        let items = DiagnosticItems::from_request(&ctx("localhost", false));
        assert_eq!(items.get("https"), Some(&[][..]));
        let items = DiagnosticItems::from_request(&ctx("localhost", true));
        assert_eq!(items.get("https").unwrap(), ["on"]);
        assert_eq!(items.names().count(), 10);
    }

    #[test]
    fn test_report_for_kind() {
        let report = ErrorReport::for_kind(ErrorKind::NoCertificate, &ctx("localhost", false));
        assert_eq!(report.errorcode, "NOCERT");
        assert_eq!(report.kind(), Some(ErrorKind::NoCertificate));
        assert_eq!(report.message, Some("No client certificate was presented"));
        assert!(report.parameters.is_empty());
    }

    #[test]
    fn test_report_serialization() {
        let mut params = Map::new();
        params.insert("source".into(), Value::String("x509".into()));
        let report = ErrorReport::new("CUSTOM", params, &ctx("localhost:8080", false));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errorcode"], "CUSTOM");
        assert!(json.get("message").is_none());
        assert_eq!(json["parameters"]["source"], "x509");
        assert_eq!(json["items"]["http_host"][0], "localhost:8080");
        assert_eq!(json["items"]["self_url"][0], "http://localhost:8080/auth/x509?a=1");
        assert!(json["items"]["https"].as_array().unwrap().is_empty());
        assert!(json["report_id"].is_string());
    }

    #[test]
    fn test_report_ids_are_unique() {
        let c = ctx("localhost", false);
        let a = ErrorReport::for_kind(ErrorKind::InvalidCertificate, &c);
        let b = ErrorReport::for_kind(ErrorKind::InvalidCertificate, &c);
        assert_ne!(a.report_id, b.report_id);
    }
}
