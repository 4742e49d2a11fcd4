//! HTTP surface: chat completions (streaming and non-streaming), model
//! listing, health, and the provider toggle endpoint.

use std::sync::Arc;
use std::time::Instant as StdInstant;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use nexus_core::HttpError;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::GatewayError;
use crate::failover::{GatewayEvent, GatewayEventStream};
use crate::lifecycle::InFlightGuard;
use crate::selector::RoutingMode;
use crate::state::EngineState;
use crate::types::{ChatMessage, CompletionOptions};

/// Build the gateway's route table over shared engine state.
///
/// The health check route is mounted separately by the caller at the
/// configured path, since whether it's mounted at all is itself
/// configurable (see [`health_router`]).
#[must_use]
pub fn build_router(state: Arc<EngineState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/models", get(list_models))
        .route("/v1/providers/toggle", post(toggle_provider))
        .with_state(state)
}

/// Build a single-route health check router, mountable at whatever path
/// `[server.health]` configures.
#[must_use]
pub fn health_router(state: Arc<EngineState>, path: &str) -> Router {
    Router::new().route(path, get(health)).with_state(state)
}

#[derive(Debug, Deserialize)]
struct ChatRequestBody {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    top_p: Option<f64>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    presence_penalty: Option<f64>,
    #[serde(default)]
    frequency_penalty: Option<f64>,
    #[serde(default)]
    stop: Option<Vec<String>>,
    #[serde(default)]
    tools: Option<serde_json::Value>,
    #[serde(default)]
    tool_choice: Option<serde_json::Value>,
    #[serde(default = "default_stream")]
    stream: bool,
}

const fn default_stream() -> bool {
    true
}

impl ChatRequestBody {
    fn validate(&self) -> Result<(), GatewayError> {
        if self.model.trim().is_empty() {
            return Err(GatewayError::Validation("model must not be empty".to_owned()));
        }
        if self.messages.is_empty() {
            return Err(GatewayError::Validation("messages must not be empty".to_owned()));
        }
        Ok(())
    }

    fn into_options(self) -> CompletionOptions {
        CompletionOptions {
            model: self.model,
            messages: self.messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stop: self.stop,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            tools: self.tools,
            tool_choice: self.tool_choice,
            stream: self.stream,
        }
    }
}

fn check_master_key(state: &EngineState, headers: &HeaderMap) -> Result<(), GatewayError> {
    let Some(expected) = &state.master_key else {
        return Ok(());
    };
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected.expose_secret() => Ok(()),
        _ => Err(GatewayError::Unauthorized),
    }
}

async fn chat_completions(
    State(state): State<Arc<EngineState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if let Err(e) = check_master_key(&state, &headers) {
        return error_response(&e);
    }

    let Some(guard) = state.lifecycle.admit() else {
        let mut response = error_response(&GatewayError::ShuttingDown);
        response
            .headers_mut()
            .insert("Retry-After", axum::http::HeaderValue::from_static("30"));
        return response;
    };

    let request: ChatRequestBody = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(&GatewayError::Validation(e.to_string())),
    };
    if let Err(e) = request.validate() {
        return error_response(&e);
    }

    let mode = RoutingMode::from_header(headers.get("X-Routing-Mode").and_then(|v| v.to_str().ok()));
    let request_id = format!("req-{}", uuid::Uuid::new_v4());
    let stream_mode = request.stream;
    let options = request.into_options();
    let messages = options.messages.clone();

    if stream_mode {
        let events = state.failover.stream(messages, options, mode, request_id);
        Sse::new(sse_stream(events, guard))
            .keep_alive(KeepAlive::default())
            .into_response()
    } else {
        let result = state.failover.complete(&messages, &options, mode).await;
        drop(guard);
        match result {
            Ok(response) => Json(response).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

/// Bridge the engine's event channel into SSE frames, holding the
/// in-flight guard alive for exactly as long as the response body stream
/// is polled: dropped either when the stream ends or when the client
/// disconnects and axum drops the body early.
fn sse_stream(events: GatewayEventStream, guard: InFlightGuard) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    enum State {
        Active(GatewayEventStream, InFlightGuard),
        Done,
    }

    futures_util::stream::unfold(State::Active(events, guard), |state| async move {
        match state {
            State::Active(mut events, guard) => match events.next().await {
                Some(event) => Some((Ok(event_to_sse(&event)), State::Active(events, guard))),
                None => Some((Ok(Event::default().data("[DONE]")), State::Done)),
            },
            State::Done => None,
        }
    })
}

fn event_to_sse(event: &GatewayEvent) -> Event {
    let created = unix_now();
    let payload = match event {
        GatewayEvent::Metadata(meta) => json!({
            "type": "gateway-metadata",
            "metadata": {
                "provider": meta.provider,
                "latency": meta.latency_ms,
                "circuit": meta.circuit,
                "healthScore": meta.health_score,
                "requestId": meta.request_id,
            }
        }),
        GatewayEvent::Chunk(text) => json!({
            "id": "",
            "object": "chat.completion.chunk",
            "created": created,
            "model": "",
            "choices": [{
                "delta": {"content": text},
                "index": 0,
                "finish_reason": serde_json::Value::Null,
            }]
        }),
        GatewayEvent::Error(message) => json!({
            "error": {"message": message, "type": "gateway_error"}
        }),
    };
    Event::default().data(payload.to_string())
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Serialize)]
struct ModelEntry {
    id: String,
    object: &'static str,
    owned_by: String,
    available: bool,
}

async fn list_models(State(state): State<Arc<EngineState>>) -> Json<serde_json::Value> {
    let data: Vec<ModelEntry> = state
        .pool
        .iter()
        .map(|(_, upstream)| {
            let available = upstream.is_enabled()
                && upstream.with_state(|s| s.breaker.is_available(tokio::time::Instant::now()));
            ModelEntry {
                id: upstream.display_name(),
                object: "model",
                owned_by: upstream.id.provider_kind.to_string(),
                available,
            }
        })
        .collect();

    Json(json!({ "object": "list", "data": data }))
}

#[derive(Debug, Serialize)]
struct UpstreamHealth {
    name: String,
    enabled: bool,
    circuit: crate::breaker::CircuitState,
    total_requests: u64,
    success_count: u64,
    fail_count: u64,
    avg_latency_ms: f64,
}

async fn health(State(state): State<Arc<EngineState>>) -> Json<serde_json::Value> {
    let status = if state.lifecycle.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };

    let upstreams: Vec<UpstreamHealth> = state
        .pool
        .iter()
        .map(|(_, upstream)| {
            upstream.with_state(|s| UpstreamHealth {
                name: upstream.display_name(),
                enabled: upstream.is_enabled(),
                circuit: s.breaker.state(),
                total_requests: s.metrics.total_requests,
                success_count: s.metrics.success_count,
                fail_count: s.metrics.fail_count,
                avg_latency_ms: s.metrics.avg_latency_ms(),
            })
        })
        .collect();

    Json(json!({
        "status": status,
        "uptime_seconds": process_uptime_seconds(),
        "upstreams": upstreams,
    }))
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    provider: String,
    enabled: bool,
}

async fn toggle_provider(State(state): State<Arc<EngineState>>, Json(body): Json<ToggleRequest>) -> Response {
    let Some(index) = state.pool.find_index_by_name(&body.provider) else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown provider"}))).into_response();
    };
    let upstream = state
        .pool
        .get(index)
        .expect("index returned by find_index_by_name is in bounds");
    upstream.set_enabled(body.enabled);

    Json(json!({"provider": body.provider, "enabled": body.enabled})).into_response()
}

fn error_response(error: &GatewayError) -> Response {
    (
        error.status_code(),
        Json(json!({
            "error": {
                "message": error.client_message(),
                "type": error.error_type(),
            }
        })),
    )
        .into_response()
}

fn process_uptime_seconds() -> u64 {
    static START: std::sync::OnceLock<StdInstant> = std::sync::OnceLock::new();
    START.get_or_init(StdInstant::now).elapsed().as_secs()
}
