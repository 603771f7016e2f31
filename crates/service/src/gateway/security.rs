use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{
    CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    X_XSS_PROTECTION,
};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use url::Url;

use crate::config::GatewayConfig;

const FALLBACK_CSP: &str = "default-src 'self'";

/// Response headers applied to every route.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    csp: HeaderValue,
}

impl SecurityHeaders {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let policy = content_security_policy(config);
        let csp = HeaderValue::from_str(&policy).unwrap_or_else(|err| {
            log::warn!("event=csp_invalid policy={:?} err={}", policy, err);
            HeaderValue::from_static(FALLBACK_CSP)
        });
        Self { csp }
    }
}

fn origin_of(base_url: &str) -> Option<String> {
    let origin = Url::parse(base_url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Same-origin policy that may additionally connect to the two provider hosts.
pub fn content_security_policy(config: &GatewayConfig) -> String {
    let mut connect = vec!["'self'".to_string()];
    for base in [&config.upstream_base_url, &config.gemini_base_url] {
        if let Some(origin) = origin_of(base) {
            if !connect.contains(&origin) {
                connect.push(origin);
            }
        }
    }
    format!(
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; \
         img-src 'self' data:; font-src 'self'; connect-src {};",
        connect.join(" ")
    )
}

pub(crate) async fn apply_security_headers(
    State(security): State<Arc<SecurityHeaders>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
    headers.insert(CONTENT_SECURITY_POLICY, security.csp.clone());
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    response
}
