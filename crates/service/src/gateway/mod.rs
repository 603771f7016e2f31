//! HTTP surface: `/api/generate` (POST and GET) and `/api/gemini`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::post;
use axum::Router;
use thinkrelay_core::guard::{InputGuard, PatternError};
use tower_http::cors::CorsLayer;

use crate::config::GatewayConfig;
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::relay::{RelayOptions, StreamRelay};
use crate::upstream::{
    build_http_client, ChatUpstream, GeminiClient, GenerativeUpstream, TogetherClient,
};

mod error;
mod handlers;
mod rate_gate;
mod security;
mod sse;
pub mod token_estimator;

pub use error::GatewayError;
pub use security::{content_security_policy, SecurityHeaders};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub guard: Arc<InputGuard>,
    pub rate_limiter: RateLimiter,
    pub chat: Arc<dyn ChatUpstream>,
    pub generative: Arc<dyn GenerativeUpstream>,
    pub relay: StreamRelay,
    pub security: Arc<SecurityHeaders>,
}

impl AppState {
    /// Wires the default provider clients from `config`.
    pub fn from_config(config: GatewayConfig) -> Result<Self, PatternError> {
        let http = build_http_client(&config);
        let chat = Arc::new(TogetherClient::from_config(http.clone(), &config));
        let generative = Arc::new(GeminiClient::from_config(http, &config));
        Self::new(config, chat, generative)
    }

    pub fn new(
        config: GatewayConfig,
        chat: Arc<dyn ChatUpstream>,
        generative: Arc<dyn GenerativeUpstream>,
    ) -> Result<Self, PatternError> {
        let guard = InputGuard::new()?;
        let rate_limiter = RateLimiter::new(RateLimitPolicy::new(
            config.rate_limit_window,
            config.rate_limit_max_requests,
        ));
        let relay = StreamRelay::new(
            Arc::clone(&chat),
            RelayOptions {
                idle_timeout: config.stream_idle_timeout,
                ..RelayOptions::default()
            },
        );
        Ok(Self {
            security: Arc::new(SecurityHeaders::from_config(&config)),
            config: Arc::new(config),
            guard: Arc::new(guard),
            rate_limiter,
            chat,
            generative,
            relay,
        })
    }
}

/// API routes behind the rate limiter; no security headers yet.
pub fn api_routes(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route(
            "/api/generate",
            post(handlers::generate_post).get(handlers::generate_get),
        )
        .route("/api/gemini", post(handlers::gemini))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_gate::rate_limit,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Applies security headers and CORS to every route of `router`.
pub fn secure(router: Router, state: &AppState) -> Router {
    router
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.security),
            security::apply_security_headers,
        ))
        .layer(CorsLayer::permissive())
}

pub fn build_router(state: AppState) -> Router {
    let router = api_routes(state.clone());
    secure(router, &state)
}
