use serde::Deserialize;

/// Per-request failover tuning: the first-token commit deadline, the
/// retry backoff between attempts, and the shutdown drain grace period.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FailoverConfig {
    /// Deadline for an attempt to produce its first chunk before it is
    /// abandoned in favor of the next candidate.
    pub first_token_timeout_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_multiplier: u32,
    pub backoff_max_ms: u64,
    /// Grace period for in-flight requests to drain on shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            first_token_timeout_ms: 8_000,
            backoff_initial_ms: 100,
            backoff_multiplier: 2,
            backoff_max_ms: 2_000,
            shutdown_timeout_ms: 10_000,
        }
    }
}
