//! Per-request sequential failover loop: select an upstream, stream its
//! response, and on an attempt failure before commit, advance to the next
//! candidate.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_stream::wrappers::ReceiverStream;

use crate::backoff::{backoff_delay, BackoffConfig};
use crate::breaker::CircuitState;
use crate::health::{health_score, PriorityTable};
use crate::pool::UpstreamPool;
use crate::selector::{select, RoutingMode};
use crate::types::{ChatMessage, CompletionOptions, CompletionResponse};
use crate::upstream::TrackedUpstream;

/// Default first-token deadline: the failover window for one attempt.
pub const DEFAULT_FIRST_TOKEN_TIMEOUT_MS: u64 = 8_000;

/// Metadata frame emitted once, just before the first chunk, naming the
/// upstream the request committed to.
#[derive(Debug, Clone)]
pub struct StreamMetadata {
    pub provider: String,
    pub latency_ms: u64,
    pub circuit: CircuitState,
    pub health_score: u8,
    pub request_id: String,
}

/// One event produced by a streaming failover attempt.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Metadata(StreamMetadata),
    Chunk(String),
    Error(String),
}

pub type GatewayEventStream = Pin<Box<dyn Stream<Item = GatewayEvent> + Send>>;

/// The per-request loop over the shared upstream pool.
pub struct FailoverEngine {
    pool: Arc<UpstreamPool>,
    priority: PriorityTable,
    backoff: BackoffConfig,
    first_token_timeout: Duration,
}

impl FailoverEngine {
    #[must_use]
    pub fn new(pool: Arc<UpstreamPool>, priority: PriorityTable, backoff: BackoffConfig, first_token_timeout_ms: u64) -> Self {
        Self {
            pool,
            priority,
            backoff,
            first_token_timeout: Duration::from_millis(first_token_timeout_ms),
        }
    }

    /// Begin a streaming failover attempt. Returns a stream of events; the
    /// caller is responsible for emitting the `[DONE]` sentinel once the
    /// stream ends.
    pub fn stream(
        self: &Arc<Self>,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
        mode: RoutingMode,
        request_id: String,
    ) -> GatewayEventStream {
        let engine = Arc::clone(self);
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            engine.run_streaming(messages, options, mode, request_id, tx).await;
        });
        Box::pin(ReceiverStream::new(rx))
    }

    /// Non-streaming failover attempt. There is no first-token deadline;
    /// otherwise the iteration, backoff, and bookkeeping are identical.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        mode: RoutingMode,
    ) -> Result<CompletionResponse, crate::error::GatewayError> {
        let mut tried = HashSet::new();
        let mut attempt_number: u32 = 0;

        loop {
            let Some(idx) = self.next_candidate(&tried, mode, &mut attempt_number).await else {
                break;
            };

            attempt_number += 1;
            tried.insert(idx);
            if attempt_number > 1 {
                tokio::time::sleep(backoff_delay(&self.backoff, attempt_number - 1)).await;
            }

            let upstream = self.pool.get(idx).expect("selected index in bounds");
            self.begin_attempt(upstream);
            let start = Instant::now();

            match upstream.adapter.complete(messages, options).await {
                Ok(response) => {
                    self.record_success(upstream, start.elapsed());
                    return Ok(response);
                }
                Err(e) => {
                    self.record_failure(upstream, start.elapsed(), &e.0);
                    tracing::warn!(
                        provider = %upstream.display_name(),
                        attempt = attempt_number,
                        error = %e,
                        "upstream attempt failed"
                    );
                }
            }
        }

        Err(crate::error::GatewayError::Exhaustion)
    }

    async fn run_streaming(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
        mode: RoutingMode,
        request_id: String,
        tx: mpsc::Sender<GatewayEvent>,
    ) {
        let mut tried = HashSet::new();
        let mut attempt_number: u32 = 0;
        let mut started = false;

        'outer: loop {
            let Some(idx) = self.next_candidate(&tried, mode, &mut attempt_number).await else {
                break;
            };

            attempt_number += 1;
            tried.insert(idx);
            if attempt_number > 1 {
                tokio::time::sleep(backoff_delay(&self.backoff, attempt_number - 1)).await;
            }

            let upstream = self.pool.get(idx).expect("selected index in bounds");
            self.begin_attempt(upstream);
            let start = Instant::now();

            let mut chunk_stream = match upstream.adapter.stream(&messages, &options).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.record_failure(upstream, start.elapsed(), &e.0);
                    tracing::warn!(
                        provider = %upstream.display_name(),
                        attempt = attempt_number,
                        error = %e,
                        "upstream attempt failed before dispatch"
                    );
                    continue;
                }
            };

            let first = tokio::time::timeout(self.first_token_timeout, chunk_stream.next()).await;
            let first_chunk = match first {
                Err(_elapsed) => {
                    self.record_failure(upstream, start.elapsed(), "first-token timeout");
                    tracing::warn!(
                        provider = %upstream.display_name(),
                        attempt = attempt_number,
                        "first-token deadline elapsed"
                    );
                    continue;
                }
                Ok(None) => {
                    self.record_success(upstream, start.elapsed());
                    return;
                }
                Ok(Some(Err(e))) => {
                    self.record_failure(upstream, start.elapsed(), &e.0);
                    continue;
                }
                Ok(Some(Ok(text))) => text,
            };

            started = true;
            tracing::info!(provider = %upstream.display_name(), attempt = attempt_number, "committed to upstream");

            let score = upstream.with_state(|s| {
                health_score(s, self.priority.bonus(upstream.id.provider_kind), Instant::now())
            });
            let circuit = upstream.with_state(|s| s.breaker.state());
            let metadata = GatewayEvent::Metadata(StreamMetadata {
                provider: upstream.display_name(),
                latency_ms: as_millis_u64(start.elapsed()),
                circuit,
                health_score: (score * 100.0).round() as u8,
                request_id: request_id.clone(),
            });

            if tx.send(metadata).await.is_err() {
                self.record_cancelled(upstream, start.elapsed());
                return;
            }
            if tx.send(GatewayEvent::Chunk(first_chunk)).await.is_err() {
                self.record_cancelled(upstream, start.elapsed());
                return;
            }

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        self.record_cancelled(upstream, start.elapsed());
                        break 'outer;
                    }
                    next = chunk_stream.next() => {
                        match next {
                            None => {
                                self.record_success(upstream, start.elapsed());
                                return;
                            }
                            Some(Ok(text)) => {
                                if tx.send(GatewayEvent::Chunk(text)).await.is_err() {
                                    self.record_cancelled(upstream, start.elapsed());
                                    return;
                                }
                            }
                            Some(Err(e)) => {
                                self.record_failure(upstream, start.elapsed(), &e.0);
                                let _ = tx.send(GatewayEvent::Error(e.0)).await;
                                return;
                            }
                        }
                    }
                }
            }
        }

        if !started {
            let _ = tx
                .send(GatewayEvent::Error(
                    "no upstream was able to serve this request".to_owned(),
                ))
                .await;
        }
    }

    /// Select the next untried candidate, retrying once after a backoff
    /// sleep if none is currently available but some untried upstream
    /// exists. Returns `None` once the loop should terminate.
    async fn next_candidate(
        &self,
        tried: &HashSet<usize>,
        mode: RoutingMode,
        attempt_number: &mut u32,
    ) -> Option<usize> {
        if let Some(idx) = select(&self.pool, tried, mode, &self.priority, Instant::now()) {
            return Some(idx);
        }
        if *attempt_number == 0 {
            return None;
        }
        let delay = backoff_delay(&self.backoff, *attempt_number);
        tokio::time::sleep(delay).await;
        select(&self.pool, tried, mode, &self.priority, Instant::now())
    }

    fn begin_attempt(&self, upstream: &TrackedUpstream) {
        upstream.with_state(|s| {
            if s.breaker.state() == CircuitState::HalfOpen {
                s.breaker.record_attempt_dispatched();
            }
            s.metrics.record_start();
        });
    }

    fn record_success(&self, upstream: &TrackedUpstream, elapsed: StdDuration) {
        let elapsed_ms = as_millis_u64(elapsed);
        upstream.with_state(|s| {
            s.metrics.record_success(elapsed_ms);
            s.breaker.record_success();
        });
    }

    fn record_failure(&self, upstream: &TrackedUpstream, elapsed: StdDuration, message: &str) {
        let elapsed_ms = as_millis_u64(elapsed);
        let now = Instant::now();
        upstream.with_state(|s| {
            s.metrics.record_failure(elapsed_ms, message, now);
            s.breaker.record_failure(now);
        });
    }

    fn record_cancelled(&self, upstream: &TrackedUpstream, elapsed: StdDuration) {
        self.record_failure(upstream, elapsed, "cancelled");
    }
}

fn as_millis_u64(d: StdDuration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
