//! Health scoring: a pure function of a tracked upstream's metrics/breaker
//! snapshot and its static priority bonus.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::breaker::CircuitState;
use crate::upstream::{ProviderKind, UpstreamMutableState};

/// Minimum number of recorded requests before the scorer trusts measured
/// success rate and latency over the flat starting score.
const MIN_REQUESTS_FOR_SCORING: u64 = 3;

/// How long a recent error keeps depressing an upstream's score.
const ERROR_PENALTY_DURATION_MS: u64 = 30_000;

/// Per-`provider_kind` bonus added to the health score, configurable so an
/// operator can retune ranking without recompiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityTable(HashMap<ProviderKind, f64>);

impl Default for PriorityTable {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(ProviderKind::Cerebras, 0.15);
        table.insert(ProviderKind::Groq, 0.10);
        table.insert(ProviderKind::Openrouter, 0.05);
        table.insert(ProviderKind::Gemini, 0.00);
        Self(table)
    }
}

impl PriorityTable {
    #[must_use]
    pub fn bonus(&self, kind: ProviderKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    /// Override the bonus for one provider kind, leaving the rest at their
    /// shipped defaults.
    pub fn set_bonus(&mut self, kind: ProviderKind, bonus: f64) {
        self.0.insert(kind, bonus);
    }
}

/// Pure function of a tracked upstream's current metrics/breaker snapshot
/// and its static priority bonus, yielding a scalar in `[0, 1]`.
#[must_use]
pub fn health_score(state: &UpstreamMutableState, priority_bonus: f64, now: Instant) -> f64 {
    match state.breaker.state() {
        CircuitState::Open => return 0.0,
        CircuitState::HalfOpen => return 0.1,
        CircuitState::Closed => {}
    }

    let metrics = &state.metrics;
    if metrics.total_requests < MIN_REQUESTS_FOR_SCORING {
        return (0.5 + priority_bonus).clamp(0.0, 1.0);
    }

    let success_rate = metrics.success_rate();
    let avg_latency = metrics.avg_latency_ms();
    let latency_score = (1.0 - avg_latency / 5000.0).max(0.0);

    let recent_error_penalty = metrics.last_error_timestamp.map_or(0.0, |ts| {
        let elapsed = now.saturating_duration_since(ts);
        let window = Duration::from_millis(ERROR_PENALTY_DURATION_MS);
        if elapsed < window {
            let remaining = (window - elapsed).as_millis() as f64 / ERROR_PENALTY_DURATION_MS as f64;
            0.3 * remaining
        } else {
            0.0
        }
    });

    (0.5 * success_rate + 0.3 * latency_score + priority_bonus - recent_error_penalty).clamp(0.0, 1.0)
}
