use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thinkrelay_core::guard::GuardRejection;
use thinkrelay_core::models::KeyResolutionError;

use crate::upstream::UpstreamError;

/// Request-level failures, rendered as `{"error": ...}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] GuardRejection),
    #[error("Invalid JSON body")]
    MalformedBody(String),
    #[error("Invalid query string")]
    MalformedQuery(String),
    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },
    #[error(transparent)]
    Key(#[from] KeyResolutionError),
    #[error("Gemini API key not configured")]
    GenerativeUnconfigured,
    #[error("Failed to get response from API")]
    Upstream(#[source] UpstreamError),
    #[error("Failed to get response from Gemini API")]
    GenerativeUpstream(#[source] UpstreamError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_)
            | GatewayError::MalformedBody(_)
            | GatewayError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Key(KeyResolutionError::MissingApiKey(_)) => StatusCode::BAD_REQUEST,
            GatewayError::Key(KeyResolutionError::Unconfigured)
            | GatewayError::GenerativeUnconfigured
            | GatewayError::Upstream(_)
            | GatewayError::GenerativeUpstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({ "error": self.to_string() });
        match &self {
            GatewayError::Upstream(err) | GatewayError::GenerativeUpstream(err) => {
                log::warn!("event=upstream_failed status={} details={}", status.as_u16(), err);
                body["details"] = json!(err.details());
            }
            GatewayError::Validation(GuardRejection::Suspicious { rule }) => {
                log::info!("event=prompt_rejected rule={}", rule);
            }
            GatewayError::MalformedBody(reason) | GatewayError::MalformedQuery(reason) => {
                log::debug!("event=malformed_request reason={}", reason);
            }
            GatewayError::RateLimited { retry_after_secs } => {
                body["retryAfter"] = json!(retry_after_secs);
            }
            GatewayError::Key(KeyResolutionError::Unconfigured)
            | GatewayError::GenerativeUnconfigured => {
                log::error!("event=key_unconfigured error={}", self);
            }
            _ => {}
        }
        let mut response = (status, Json(body)).into_response();
        if let GatewayError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
