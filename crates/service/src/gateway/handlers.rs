use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use thinkrelay_core::models::{resolve_api_key, ApiKey, ModelId};

use super::sse::event_stream_response;
use super::token_estimator::estimate_exchange_tokens;
use super::{AppState, GatewayError};
use crate::upstream::ChatRequest;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateQuery {
    prompt: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

fn parse_json_body(body: &Bytes) -> Result<Value, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|err| GatewayError::MalformedBody(err.to_string()))
}

fn chat_request(
    state: &AppState,
    prompt: String,
    model: Option<&str>,
    caller_key: Option<&str>,
    route: &str,
) -> Result<ChatRequest, GatewayError> {
    let model = ModelId::from_request(model);
    let (api_key, source) =
        resolve_api_key(&model, caller_key, state.config.together_api_key.as_ref())?;
    log::info!(
        "event=generate route={} model={} key_source={} prompt_chars={}",
        route,
        model,
        source.as_str(),
        prompt.chars().count()
    );
    Ok(ChatRequest::new(model, prompt, api_key))
}

/// Streams for the streaming model family, otherwise one buffered JSON answer.
pub(crate) async fn generate_post(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let payload = parse_json_body(&body)?;
    let prompt = state.guard.validate_value(payload.get("prompt"))?;
    let request = chat_request(
        &state,
        prompt,
        payload.get("model").and_then(Value::as_str),
        payload.get("api_key").and_then(Value::as_str),
        "post",
    )?;

    if request.model.streams_on_post() {
        return Ok(event_stream_response(state.relay.spawn(request)));
    }
    let completion = state
        .chat
        .complete(&request)
        .await
        .map_err(GatewayError::Upstream)?;
    Ok(Json(json!({
        "thinking": "",
        "response": completion.content,
        "tokenCount": completion.token_count,
    }))
    .into_response())
}

pub(crate) async fn generate_get(
    State(state): State<AppState>,
    query: Result<Query<GenerateQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(query) = query.map_err(|err| GatewayError::MalformedQuery(err.body_text()))?;
    let prompt = state.guard.validate(query.prompt.as_deref())?;
    let request = chat_request(
        &state,
        prompt,
        query.model.as_deref(),
        query.api_key.as_deref(),
        "get",
    )?;
    Ok(event_stream_response(state.relay.spawn(request)))
}

pub(crate) async fn gemini(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let payload = parse_json_body(&body)?;
    let prompt = state.guard.validate_value(payload.get("prompt"))?;
    let api_key: &ApiKey = state
        .config
        .gemini_api_key
        .as_ref()
        .ok_or(GatewayError::GenerativeUnconfigured)?;
    log::info!(
        "event=generate route=gemini prompt_chars={}",
        prompt.chars().count()
    );
    let response = state
        .generative
        .generate(&prompt, api_key)
        .await
        .map_err(GatewayError::GenerativeUpstream)?;
    let token_count = estimate_exchange_tokens(&prompt, &response);
    Ok(Json(json!({ "response": response, "tokenCount": token_count })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_body_is_an_empty_object() {
        assert_eq!(parse_json_body(&Bytes::from_static(b"  \n")).ok(), Some(json!({})));
        assert!(matches!(
            parse_json_body(&Bytes::from_static(b"{\"prompt\":")),
            Err(GatewayError::MalformedBody(_))
        ));
    }
}
