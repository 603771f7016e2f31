use std::time::Duration;

use futures_util::TryStreamExt;
use serde::Serialize;
use serde_json::Value;

use super::{
    key_fingerprint, BufferedCompletion, ByteStream, ChatRequest, ChatUpstream, UpstreamError,
};
use crate::config::GatewayConfig;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

/// OpenAI-compatible chat-completions provider (Together by default).
#[derive(Clone)]
pub struct TogetherClient {
    http: reqwest::Client,
    base_url: String,
    total_timeout: Option<Duration>,
    /// Streams bound only the wait for response headers; the body may run long.
    header_timeout: Option<Duration>,
}

impl TogetherClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            total_timeout: None,
            header_timeout: None,
        }
    }

    pub fn from_config(http: reqwest::Client, config: &GatewayConfig) -> Self {
        Self::new(http, config.upstream_base_url.clone())
            .with_total_timeout(config.total_timeout)
            .with_header_timeout(config.stream_idle_timeout.or(config.total_timeout))
    }

    pub fn with_total_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.total_timeout = timeout;
        self
    }

    pub fn with_header_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.header_timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, UpstreamError> {
        let body = ChatBody {
            model: request.model.as_str(),
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream,
        };
        let mut builder = self
            .http
            .post(self.endpoint())
            .bearer_auth(request.api_key.expose())
            .json(&body);
        if !stream {
            if let Some(timeout) = self.total_timeout {
                builder = builder.timeout(timeout);
            }
        }
        log::info!(
            "event=upstream_request provider=together model={} stream={} key={}",
            request.model,
            stream,
            key_fingerprint(&request.api_key)
        );
        let pending = builder.send();
        let sent = match self.header_timeout.filter(|_| stream) {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(sent) => sent,
                Err(_) => {
                    log::warn!(
                        "event=upstream_header_timeout provider=together model={} limit_ms={}",
                        request.model,
                        limit.as_millis()
                    );
                    return Err(UpstreamError::Connect {
                        status: None,
                        body: Some(format!(
                            "no response headers within {}ms",
                            limit.as_millis()
                        )),
                    });
                }
            },
            None => pending.await,
        };
        let response = sent.map_err(UpstreamError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!(
                "event=upstream_status provider=together model={} status={}",
                request.model,
                status.as_u16()
            );
            return Err(UpstreamError::from_status(status, body));
        }
        Ok(response)
    }
}

fn parse_completion(value: &Value) -> Result<BufferedCompletion, UpstreamError> {
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| UpstreamError::Decode("missing choices[0].message.content".to_string()))?;
    let token_count = value
        .pointer("/usage/total_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Ok(BufferedCompletion {
        content: content.to_string(),
        token_count,
    })
}

#[async_trait::async_trait]
impl ChatUpstream for TogetherClient {
    async fn complete(&self, request: &ChatRequest) -> Result<BufferedCompletion, UpstreamError> {
        let response = self.send(request, false).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|err| UpstreamError::Decode(err.to_string()))?;
        parse_completion(&value)
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, UpstreamError> {
        let response = self.send(request, true).await?;
        let stream = response
            .bytes_stream()
            .map_err(|err| UpstreamError::Stream(err.to_string()));
        Ok(Box::pin(stream))
    }
}
