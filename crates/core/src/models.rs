use std::fmt;

/// Model used when the caller does not pick one, and the fixed target of the
/// one-shot streaming fallback.
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Llama-70B-free";
pub const FALLBACK_MODEL: &str = DEFAULT_MODEL;

// Premium family: callers must bring their own key.
const CALLER_KEY_FAMILY: &str = "Qwen";
const CALLER_KEY_FAMILY_LABEL: &str = "Qwen3";
// Family served as an event stream on the POST route.
const STREAMING_FAMILY: &str = "DeepSeek";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(raw: impl Into<String>) -> Self {
        ModelId(raw.into())
    }

    /// Blank or missing selections resolve to [`DEFAULT_MODEL`].
    pub fn from_request(raw: Option<&str>) -> Self {
        raw.map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ModelId::new)
            .unwrap_or_else(ModelId::default_model)
    }

    pub fn default_model() -> Self {
        ModelId::new(DEFAULT_MODEL)
    }

    pub fn fallback_model() -> Self {
        ModelId::new(FALLBACK_MODEL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn requires_caller_key(&self) -> bool {
        self.0.contains(CALLER_KEY_FAMILY)
    }

    pub fn streams_on_post(&self) -> bool {
        self.0.contains(STREAMING_FAMILY)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(ApiKey(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Caller,
    Server,
}

impl KeySource {
    pub fn as_str(self) -> &'static str {
        match self {
            KeySource::Caller => "caller",
            KeySource::Server => "server",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyResolutionError {
    #[error("API key required for {0} model")]
    MissingApiKey(&'static str),
    #[error("API key not configured")]
    Unconfigured,
}

/// Picks the credential for `model`: the premium family only runs on a
/// caller-supplied key, every other model on the server-held default.
pub fn resolve_api_key(
    model: &ModelId,
    caller_key: Option<&str>,
    server_key: Option<&ApiKey>,
) -> Result<(ApiKey, KeySource), KeyResolutionError> {
    if model.requires_caller_key() {
        return caller_key
            .and_then(ApiKey::new)
            .map(|key| (key, KeySource::Caller))
            .ok_or(KeyResolutionError::MissingApiKey(CALLER_KEY_FAMILY_LABEL));
    }
    server_key
        .cloned()
        .map(|key| (key, KeySource::Server))
        .ok_or(KeyResolutionError::Unconfigured)
}
