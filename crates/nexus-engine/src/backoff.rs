use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Tunables for the exponential backoff curve between failover attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            multiplier: 2,
            max_delay_ms: 2000,
        }
    }
}

/// `backoff(k) = min(initial_delay * multiplier^(k-1), max_delay)` for `k >= 1`.
#[must_use]
pub fn backoff_delay(config: &BackoffConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let exponent = attempt - 1;
    let scaled = u64::from(config.multiplier)
        .checked_pow(exponent)
        .and_then(|m| config.initial_delay_ms.checked_mul(m))
        .unwrap_or(config.max_delay_ms);
    Duration::from_millis(scaled.min(config.max_delay_ms))
}
