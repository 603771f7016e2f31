use std::time::Duration;

use thinkrelay_core::models::ApiKey;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.together.xyz/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_UPSTREAM_TOTAL_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_UPSTREAM_STREAM_IDLE_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: usize = 10;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

pub const ENV_TOGETHER_API_KEY: &str = "TOGETHER_API_KEY";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
const ENV_PORT: &str = "PORT";
const ENV_ADDR: &str = "THINKRELAY_ADDR";
const ENV_UPSTREAM_BASE_URL: &str = "THINKRELAY_UPSTREAM_BASE_URL";
const ENV_GEMINI_BASE_URL: &str = "THINKRELAY_GEMINI_BASE_URL";
const ENV_GEMINI_MODEL: &str = "THINKRELAY_GEMINI_MODEL";
const ENV_UPSTREAM_CONNECT_TIMEOUT_SECS: &str = "THINKRELAY_UPSTREAM_CONNECT_TIMEOUT_SECS";
const ENV_UPSTREAM_TOTAL_TIMEOUT_MS: &str = "THINKRELAY_UPSTREAM_TOTAL_TIMEOUT_MS";
const ENV_UPSTREAM_STREAM_IDLE_TIMEOUT_MS: &str = "THINKRELAY_UPSTREAM_STREAM_IDLE_TIMEOUT_MS";
const ENV_RATE_LIMIT_WINDOW_MS: &str = "THINKRELAY_RATE_LIMIT_WINDOW_MS";
const ENV_RATE_LIMIT_MAX_REQUESTS: &str = "THINKRELAY_RATE_LIMIT_MAX_REQUESTS";
const ENV_MAX_BODY_BYTES: &str = "THINKRELAY_MAX_BODY_BYTES";

/// Gateway settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    pub together_api_key: Option<ApiKey>,
    pub gemini_api_key: Option<ApiKey>,
    pub upstream_base_url: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub connect_timeout: Duration,
    /// Whole-call limit for buffered requests; `None` disables it.
    pub total_timeout: Option<Duration>,
    /// Longest wait for the next streamed chunk; `None` disables it.
    pub stream_idle_timeout: Option<Duration>,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: usize,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            together_api_key: None,
            gemini_api_key: None,
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS),
            total_timeout: optional_millis(DEFAULT_UPSTREAM_TOTAL_TIMEOUT_MS),
            stream_idle_timeout: optional_millis(DEFAULT_UPSTREAM_STREAM_IDLE_TIMEOUT_MS),
            rate_limit_window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let listen_addr = env_non_empty(ENV_ADDR).unwrap_or_else(|| {
            let port = env_non_empty(ENV_PORT)
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT);
            format!("0.0.0.0:{port}")
        });
        Self {
            listen_addr,
            together_api_key: env_non_empty(ENV_TOGETHER_API_KEY)
                .and_then(|value| ApiKey::new(&value)),
            gemini_api_key: env_non_empty(ENV_GEMINI_API_KEY).and_then(|value| ApiKey::new(&value)),
            upstream_base_url: env_url_or(ENV_UPSTREAM_BASE_URL, DEFAULT_UPSTREAM_BASE_URL),
            gemini_base_url: env_url_or(ENV_GEMINI_BASE_URL, DEFAULT_GEMINI_BASE_URL),
            gemini_model: env_non_empty(ENV_GEMINI_MODEL)
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            connect_timeout: Duration::from_secs(env_u64_or(
                ENV_UPSTREAM_CONNECT_TIMEOUT_SECS,
                DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS,
            )),
            total_timeout: optional_millis(env_u64_or(
                ENV_UPSTREAM_TOTAL_TIMEOUT_MS,
                DEFAULT_UPSTREAM_TOTAL_TIMEOUT_MS,
            )),
            stream_idle_timeout: optional_millis(env_u64_or(
                ENV_UPSTREAM_STREAM_IDLE_TIMEOUT_MS,
                DEFAULT_UPSTREAM_STREAM_IDLE_TIMEOUT_MS,
            )),
            rate_limit_window: Duration::from_millis(
                env_u64_or(ENV_RATE_LIMIT_WINDOW_MS, DEFAULT_RATE_LIMIT_WINDOW_MS).max(1),
            ),
            rate_limit_max_requests: env_usize_or(
                ENV_RATE_LIMIT_MAX_REQUESTS,
                DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            ),
            max_body_bytes: env_usize_or(ENV_MAX_BODY_BYTES, DEFAULT_MAX_BODY_BYTES),
        }
    }
}

fn optional_millis(value: u64) -> Option<Duration> {
    if value == 0 {
        None
    } else {
        Some(Duration::from_millis(value))
    }
}

fn env_url_or(name: &str, default: &str) -> String {
    env_non_empty(name)
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64_or(name: &str, default: u64) -> u64 {
    env_non_empty(name)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize_or(name: &str, default: usize) -> usize {
    env_non_empty(name)
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        key: &'static str,
        original: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let original = std::env::var_os(key);
            std::env::set_var(key, value);
            Self { key, original }
        }

        fn unset(key: &'static str) -> Self {
            let original = std::env::var_os(key);
            std::env::remove_var(key);
            Self { key, original }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.original {
                std::env::set_var(self.key, value);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn from_env_reads_overrides() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _addr = EnvGuard::unset(ENV_ADDR);
        let _port = EnvGuard::set(ENV_PORT, "8088");
        let _key = EnvGuard::set(ENV_TOGETHER_API_KEY, "  tg-key  ");
        let _gemini = EnvGuard::set(ENV_GEMINI_API_KEY, "");
        let _base = EnvGuard::set(ENV_UPSTREAM_BASE_URL, "http://127.0.0.1:9/v1/");
        let _total = EnvGuard::set(ENV_UPSTREAM_TOTAL_TIMEOUT_MS, "0");
        let _idle = EnvGuard::set(ENV_UPSTREAM_STREAM_IDLE_TIMEOUT_MS, "250");
        let _max = EnvGuard::set(ENV_RATE_LIMIT_MAX_REQUESTS, "3");

        let config = GatewayConfig::from_env();

        assert_eq!(config.listen_addr, "0.0.0.0:8088");
        assert_eq!(
            config.together_api_key.as_ref().map(ApiKey::expose),
            Some("tg-key")
        );
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.upstream_base_url, "http://127.0.0.1:9/v1");
        assert_eq!(config.total_timeout, None);
        assert_eq!(config.stream_idle_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.rate_limit_max_requests, 3);
    }

    #[test]
    fn explicit_address_wins_over_port_and_bad_numbers_use_defaults() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _addr = EnvGuard::set(ENV_ADDR, "localhost:4000");
        let _port = EnvGuard::set(ENV_PORT, "8088");
        let _window = EnvGuard::set(ENV_RATE_LIMIT_WINDOW_MS, "soon");
        let _body = EnvGuard::unset(ENV_MAX_BODY_BYTES);

        let config = GatewayConfig::from_env();

        assert_eq!(config.listen_addr, "localhost:4000");
        assert_eq!(config.rate_limit_window, Duration::from_millis(60_000));
        assert_eq!(config.max_body_bytes, 1024 * 1024);
    }
}
