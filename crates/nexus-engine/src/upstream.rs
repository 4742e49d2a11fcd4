use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::adapter::Adapter;
use crate::breaker::CircuitBreaker;
use crate::metrics::MetricsRecord;

/// The fixed enumeration of chat-completion upstreams this gateway fronts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    Gemini,
    Openrouter,
    Cerebras,
}

/// Stable identity of one upstream instance: a provider kind plus an
/// instance id unique within that provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamId {
    pub provider_kind: ProviderKind,
    pub instance_id: String,
}

impl fmt::Display for UpstreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.provider_kind, self.instance_id)
    }
}

/// The metrics/breaker pair that must always be observed as a consistent
/// whole: a breaker transition and the timestamp that justifies it must
/// never be read separately.
pub struct UpstreamMutableState {
    pub metrics: MetricsRecord,
    pub breaker: CircuitBreaker,
}

/// One adapter bundled with its identity, health bookkeeping, and toggle.
pub struct TrackedUpstream {
    pub id: UpstreamId,
    pub adapter: Box<dyn Adapter>,
    pub priority_bonus: f64,
    pub enabled: AtomicBool,
    state: Mutex<UpstreamMutableState>,
}

impl TrackedUpstream {
    #[must_use]
    pub fn new(id: UpstreamId, adapter: Box<dyn Adapter>, priority_bonus: f64, breaker: CircuitBreaker) -> Self {
        Self {
            id,
            adapter,
            priority_bonus,
            enabled: AtomicBool::new(true),
            state: Mutex::new(UpstreamMutableState {
                metrics: MetricsRecord::default(),
                breaker,
            }),
        }
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        self.id.to_string()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Access metrics and breaker together under the single lock that
    /// guards their cross-field consistency. Must never be held across an
    /// `.await`.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut UpstreamMutableState) -> T) -> T {
        let mut guard = self.state.lock().expect("upstream state mutex poisoned");
        f(&mut guard)
    }
}
