use serde::Deserialize;

/// Circuit breaker tuning, shared by every upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// Time an open breaker waits before allowing a probe attempt.
    pub reset_timeout_ms: u64,
    /// Concurrent probe attempts allowed while half-open.
    pub half_open_max_attempts: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 60_000,
            half_open_max_attempts: 1,
        }
    }
}
