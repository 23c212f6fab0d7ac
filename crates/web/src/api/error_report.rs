//! Error report controller.
//!
//! Renders an [`ErrorReport`] for an error code supplied by the caller,
//! together with diagnostics derived from the current request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Uri, Version};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};

use x509saml_core::config::AppConfig;
use x509saml_core::error_report::{ErrorReport, RequestContext};

use crate::api::status::AppError;
use crate::AppState;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Deserialize)]
struct ErrorReportBody {
    #[serde(alias = "errorCode")]
    errorcode: Option<String>,
    #[serde(default)]
    parameters: Map<String, Value>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/errorreport", get(get_report).post(post_report))
}

/// `GET /errorreport?errorcode=...`; every other query pair becomes a parameter.
async fn get_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    version: Version,
    Query(mut query): Query<HashMap<String, String>>,
) -> Result<Json<ErrorReport>, AppError> {
    let errorcode = query
        .remove("errorcode")
        .or_else(|| query.remove("errorCode"));
    let parameters = query
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    render(&state.config, &headers, &uri, version, errorcode, parameters)
}

async fn post_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    version: Version,
    Json(body): Json<ErrorReportBody>,
) -> Result<Json<ErrorReport>, AppError> {
    render(&state.config, &headers, &uri, version, body.errorcode, body.parameters)
}

fn render(
    config: &AppConfig,
    headers: &HeaderMap,
    uri: &Uri,
    version: Version,
    errorcode: Option<String>,
    parameters: Map<String, Value>,
) -> Result<Json<ErrorReport>, AppError> {
    let errorcode = errorcode
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("missing errorcode".into()))?;

    let ctx = request_context(config, headers, uri, version);
    let report = ErrorReport::new(errorcode, parameters, &ctx);
    report.log();
    Ok(Json(report))
}

/// Describe the current request for diagnostic items.
///
/// TLS is terminated upstream, so the scheme comes from `X-Forwarded-Proto`
/// when the request URI itself carries none.
pub(crate) fn request_context(
    config: &AppConfig,
    headers: &HeaderMap,
    uri: &Uri,
    version: Version,
) -> RequestContext {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or_else(|| uri.authority().map(|a| a.as_str().to_owned()))
        .unwrap_or_else(|| config.web.listen.clone());

    let secure = uri.scheme_str() == Some("https")
        || headers
            .get(FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));

    RequestContext {
        host,
        secure,
        protocol: format!("{version:?}"),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_owned),
        base_url: config.web.base_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    use crate::api::testing::{app, send, state};

    #[test]
    fn test_request_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "idp.example.org:8443".parse().unwrap());
        headers.insert(FORWARDED_PROTO, "HTTPS".parse().unwrap());
        let uri: Uri = "/errorreport?errorcode=NOCERT".parse().unwrap();

        let ctx = request_context(&AppConfig::default(), &headers, &uri, Version::HTTP_11);
        assert_eq!(ctx.host, "idp.example.org:8443");
        assert!(ctx.secure);
        assert_eq!(ctx.protocol, "HTTP/1.1");
        assert_eq!(ctx.path, "/errorreport");
        assert_eq!(ctx.query.as_deref(), Some("errorcode=NOCERT"));
        assert!(ctx.base_url.is_none());
    }

    #[test]
    fn test_request_context_falls_back_to_listen_address() {
        let uri: Uri = "/errorreport".parse().unwrap();
        let ctx = request_context(&AppConfig::default(), &HeaderMap::new(), &uri, Version::HTTP_11);
        assert_eq!(ctx.host, "127.0.0.1:8080");
        assert!(!ctx.secure);
    }

    #[tokio::test]
    async fn test_get_report() {
        let request = Request::get("/errorreport?errorcode=NOCERT&source=x509")
            .header("host", "idp.example.org")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app(state(AppConfig::default())), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["errorcode"], "NOCERT");
        assert_eq!(json["message"], "No client certificate was presented");
        assert_eq!(json["parameters"]["source"], "x509");
        assert!(json["parameters"].get("errorcode").is_none());
        assert_eq!(json["items"]["http_host"][0], "idp.example.org");
        assert_eq!(json["items"]["self_host"][0], "idp.example.org");
        assert_eq!(json["items"]["base_url"][0], "http://idp.example.org/");
        assert_eq!(
            json["items"]["self_url"][0],
            "http://idp.example.org/errorreport?errorcode=NOCERT&source=x509"
        );
        assert!(json["items"]["https"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_report() {
        let mut config = AppConfig::default();
        config.web.base_url = Some("https://idp.example.org/simplesaml/".into());

        let body = serde_json::json!({
            "errorCode": "INVALIDCERT",
            "parameters": { "attempt": 2, "detail": "bad der" }
        });
        let request = Request::post("/errorreport")
            .header("host", "idp.example.org:443")
            .header("x-forwarded-proto", "https")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, json) = send(app(state(config)), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["errorcode"], "INVALIDCERT");
        assert_eq!(json["parameters"]["attempt"], 2);
        assert_eq!(json["items"]["https"][0], "on");
        assert_eq!(json["items"]["base_url"][0], "https://idp.example.org/simplesaml/");
        assert_eq!(
            json["items"]["self_host_with_non_standard_port"][0],
            "idp.example.org"
        );
    }

    #[tokio::test]
    async fn test_unknown_code_has_no_message() {
        let request = Request::get("/errorreport?errorcode=SOMETHING")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app(state(AppConfig::default())), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["errorcode"], "SOMETHING");
        assert!(json.get("message").is_none());
    }

    #[tokio::test]
    async fn test_missing_errorcode_is_rejected() {
        let request = Request::get("/errorreport").body(Body::empty()).unwrap();
        let (status, json) = send(app(state(AppConfig::default())), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "missing errorcode");
    }
}
