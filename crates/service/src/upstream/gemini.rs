use std::time::Duration;

use serde_json::{json, Value};
use thinkrelay_core::models::ApiKey;

use super::{key_fingerprint, GenerativeUpstream, UpstreamError};
use crate::config::GatewayConfig;

/// Google generative-language `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    total_timeout: Option<Duration>,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            total_timeout: None,
        }
    }

    pub fn from_config(http: reqwest::Client, config: &GatewayConfig) -> Self {
        let mut client = Self::new(
            http,
            config.gemini_base_url.clone(),
            config.gemini_model.clone(),
        );
        client.total_timeout = config.total_timeout;
        client
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Concatenates the text parts of the first candidate.
fn candidate_text(value: &Value) -> Result<String, UpstreamError> {
    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| UpstreamError::Decode("missing candidates[0].content.parts".to_string()))?;
    Ok(parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect())
}

#[async_trait::async_trait]
impl GenerativeUpstream for GeminiClient {
    async fn generate(&self, prompt: &str, api_key: &ApiKey) -> Result<String, UpstreamError> {
        let body = json!({ "contents": [{ "role": "user", "parts": [{ "text": prompt }] }] });
        let mut builder = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose())
            .json(&body);
        if let Some(timeout) = self.total_timeout {
            builder = builder.timeout(timeout);
        }
        log::info!(
            "event=upstream_request provider=gemini model={} key={}",
            self.model,
            key_fingerprint(api_key)
        );
        let response = builder.send().await.map_err(UpstreamError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!(
                "event=upstream_status provider=gemini model={} status={}",
                self.model,
                status.as_u16()
            );
            return Err(UpstreamError::from_status(status, body));
        }
        let value: Value = response
            .json()
            .await
            .map_err(|err| UpstreamError::Decode(err.to_string()))?;
        candidate_text(&value)
    }
}
