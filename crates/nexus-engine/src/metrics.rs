use tokio::time::Instant;

/// Per-upstream counters and latency accumulator.
///
/// Updated only at attempt boundaries: `total_requests` on start,
/// `success_count`/`fail_count` plus `total_latency_ms` on end.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecord {
    pub total_requests: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub total_latency_ms: u64,
    pub last_error_message: Option<String>,
    pub last_error_timestamp: Option<Instant>,
}

impl MetricsRecord {
    /// Record the start of an attempt.
    pub fn record_start(&mut self) {
        self.total_requests += 1;
    }

    /// Record a successful attempt ending `elapsed` after it started.
    pub fn record_success(&mut self, elapsed_ms: u64) {
        self.success_count += 1;
        self.total_latency_ms += elapsed_ms;
    }

    /// Record a failed attempt ending `elapsed` after it started.
    pub fn record_failure(&mut self, elapsed_ms: u64, error: impl Into<String>, now: Instant) {
        self.fail_count += 1;
        self.total_latency_ms += elapsed_ms;
        self.last_error_message = Some(error.into());
        self.last_error_timestamp = Some(now);
    }

    /// Average attempt latency, `0.0` if no requests have been recorded.
    #[must_use]
    pub fn avg_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_requests as f64
        }
    }

    /// Fraction of requests that succeeded, `0.0` if no requests have been recorded.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_requests as f64
        }
    }
}
