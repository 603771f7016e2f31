//! Provider clients. Chat completions go through [`ChatUpstream`], the
//! single-shot generative endpoint through [`GenerativeUpstream`].

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use sha2::{Digest, Sha256};
use thinkrelay_core::models::{ApiKey, ModelId};

use crate::config::GatewayConfig;

pub mod gemini;
pub mod together;

pub use gemini::GeminiClient;
pub use together::TogetherClient;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: ModelId,
    pub prompt: String,
    pub api_key: ApiKey,
}

impl ChatRequest {
    pub fn new(model: ModelId, prompt: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            api_key,
        }
    }

    /// Same prompt and credential aimed at another model.
    pub fn with_model(&self, model: ModelId) -> Self {
        Self {
            model,
            prompt: self.prompt.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedCompletion {
    pub content: String,
    pub token_count: u64,
}

pub enum Completion {
    Buffered(BufferedCompletion),
    Stream(ByteStream),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// The call never produced a usable response: transport failure or non-2xx.
    #[error("{}", connect_message(.status, .body))]
    Connect {
        status: Option<u16>,
        body: Option<String>,
    },
    #[error("upstream stream failed: {0}")]
    Stream(String),
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
}

fn connect_message(status: &Option<u16>, body: &Option<String>) -> String {
    match (*status, body.as_deref()) {
        (Some(status), Some(body)) if !body.is_empty() => {
            format!("Request failed with status code {status}: {body}")
        }
        (Some(status), _) => format!("Request failed with status code {status}"),
        (None, Some(body)) => body.to_string(),
        (None, None) => "upstream unreachable".to_string(),
    }
}

impl UpstreamError {
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, UpstreamError::Connect { .. })
    }

    /// Provider detail passed through in `details` of HTTP error bodies.
    pub fn details(&self) -> String {
        self.to_string()
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        UpstreamError::Connect {
            status: err.status().map(|status| status.as_u16()),
            body: Some(err.to_string()),
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        UpstreamError::Connect {
            status: Some(status.as_u16()),
            body: Some(body),
        }
    }
}

/// Chat-completions provider.
#[async_trait::async_trait]
pub trait ChatUpstream: Send + Sync {
    /// One buffered call; the whole answer arrives in a single JSON body.
    async fn complete(&self, request: &ChatRequest) -> Result<BufferedCompletion, UpstreamError>;

    /// Opens a chunked stream. Errors returned here are connection failures;
    /// errors yielded by the stream happened after streaming began.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, UpstreamError>;
}

/// Dispatches on the transport mode.
pub async fn complete(
    upstream: &dyn ChatUpstream,
    request: &ChatRequest,
    stream: bool,
) -> Result<Completion, UpstreamError> {
    if stream {
        upstream.open_stream(request).await.map(Completion::Stream)
    } else {
        upstream.complete(request).await.map(Completion::Buffered)
    }
}

/// Single-shot generative-content provider.
#[async_trait::async_trait]
pub trait GenerativeUpstream: Send + Sync {
    async fn generate(&self, prompt: &str, api_key: &ApiKey) -> Result<String, UpstreamError>;
}

pub fn build_http_client(config: &GatewayConfig) -> reqwest::Client {
    reqwest::Client::builder()
        // Streams may legitimately run long; buffered calls set a per-request timeout.
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(32)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .build()
        .unwrap_or_else(|err| {
            log::warn!("event=http_client_build_failed err={}", err);
            reqwest::Client::new()
        })
}

/// Short SHA-256 prefix that identifies a key in logs without revealing it.
pub fn key_fingerprint(key: &ApiKey) -> String {
    let digest = Sha256::digest(key.expose().as_bytes());
    digest
        .iter()
        .take(4)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
