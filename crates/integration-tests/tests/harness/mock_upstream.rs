//! In-process mock of a remote OpenAI-compatible chat-completions API.
//!
//! The openai-compatible adapter always requests `stream: true` regardless
//! of what the gateway's caller asked for (non-streaming mode folds the
//! chunk stream), so the mock only ever needs to speak SSE.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing, Json, Router};
use futures_util::{stream, StreamExt};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Behavior {
    /// Respond normally with the given chunk texts.
    Normal(Vec<String>),
    /// Sleep for `delay` before sending any SSE data.
    HangBeforeFirstChunk(Duration, Vec<String>),
    /// Send the chunks, then kill the connection instead of a `[DONE]`.
    FailMidStream(Vec<String>),
    /// Commit immediately, then sleep `interval` before every chunk after
    /// the first (including the final `[DONE]`).
    SlowChunks(Duration, Vec<String>),
}

struct MockState {
    behavior: Behavior,
    fail_remaining: AtomicU32,
    request_count: AtomicU32,
}

pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start_normal(reply: &str) -> anyhow::Result<Self> {
        Self::start(Behavior::Normal(words(reply)), 0).await
    }

    /// Fails the first `times` requests with a 500, then responds normally.
    pub async fn start_failing(times: u32) -> anyhow::Result<Self> {
        Self::start(Behavior::Normal(words("recovered")), times).await
    }

    pub async fn start_hanging(delay: Duration) -> anyhow::Result<Self> {
        Self::start(Behavior::HangBeforeFirstChunk(delay, words("too slow")), 0).await
    }

    pub async fn start_failing_mid_stream() -> anyhow::Result<Self> {
        Self::start(Behavior::FailMidStream(words("partial answer")), 0).await
    }

    /// Commits fast but keeps producing chunks slowly, for exercising the
    /// shutdown grace period against a still-streaming upstream.
    pub async fn start_slow(interval: Duration) -> anyhow::Result<Self> {
        Self::start(Behavior::SlowChunks(interval, words("one two three four five")), 0).await
    }

    async fn start(behavior: Behavior, fail_remaining: u32) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            behavior,
            fail_remaining: AtomicU32::new(fail_remaining),
            request_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL suitable for a `[[providers]]` override; the adapter
    /// appends `/chat/completions` itself.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| format!("{w} ")).collect()
}

async fn handle_chat_completions(State(state): State<Arc<MockState>>, _body: Bytes) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    if state.fail_remaining.load(Ordering::Relaxed) > 0 {
        state.fail_remaining.fetch_sub(1, Ordering::Relaxed);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"message": "mock upstream intentional failure", "type": "server_error"}})),
        )
            .into_response();
    }

    match state.behavior.clone() {
        Behavior::Normal(chunks) => sse_response(chunks, false, Duration::ZERO),
        Behavior::HangBeforeFirstChunk(delay, chunks) => sse_response(chunks, false, delay),
        Behavior::FailMidStream(chunks) => sse_response(chunks, true, Duration::ZERO),
        Behavior::SlowChunks(interval, chunks) => slow_sse_response(chunks, interval),
    }
}

/// Like [`sse_response`], but spaces every frame after the first `interval`
/// apart instead of emitting them all at once.
fn slow_sse_response(chunks: Vec<String>, interval: Duration) -> Response {
    let mut frames: Vec<Result<Bytes, std::io::Error>> = Vec::new();
    for text in chunks {
        let frame = format!("data: {}\n\n", json!({"choices": [{"delta": {"content": text}}]}));
        frames.push(Ok(Bytes::from(frame)));
    }
    frames.push(Ok(Bytes::from_static(b"data: [DONE]\n\n")));

    let body_stream = stream::unfold((frames.into_iter(), true), move |(mut iter, first)| async move {
        if !first {
            tokio::time::sleep(interval).await;
        }
        iter.next().map(|item| (item, (iter, false)))
    });

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(body_stream)).into_response()
}

fn sse_response(chunks: Vec<String>, fail_after: bool, initial_delay: Duration) -> Response {
    let mut items: Vec<Result<Bytes, std::io::Error>> = Vec::new();
    for text in chunks {
        let frame = format!("data: {}\n\n", json!({"choices": [{"delta": {"content": text}}]}));
        items.push(Ok(Bytes::from(frame)));
    }

    if fail_after {
        items.push(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "mock upstream died mid-stream",
        )));
    } else {
        items.push(Ok(Bytes::from_static(b"data: [DONE]\n\n")));
    }

    let body_stream = stream::once(async move {
        if !initial_delay.is_zero() {
            tokio::time::sleep(initial_delay).await;
        }
        stream::iter(items)
    })
    .flatten();

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(body_stream)).into_response()
}
