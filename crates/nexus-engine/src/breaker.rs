use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

/// Tunables for the circuit breaker state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
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

/// The three states a breaker can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-upstream circuit breaker.
///
/// Guards one upstream against repeated dispatch while it is failing.
/// `failures` is a consecutive-failure counter that decrements (rather than
/// resets) on success in CLOSED, so isolated failures among a majority of
/// successes never trip the breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failures: u32,
    half_open_attempts: u32,
    last_failure_timestamp: Option<Instant>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            half_open_attempts: 0,
            last_failure_timestamp: None,
            config,
        }
    }

    #[must_use]
    pub const fn state(&self) -> CircuitState {
        self.state
    }

    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Whether this upstream can currently be dispatched to.
    ///
    /// Consulting availability may itself move OPEN to HALF_OPEN once the
    /// reset timeout has elapsed, so this takes `&mut self`.
    pub fn is_available(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self
                    .last_failure_timestamp
                    .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
                if elapsed >= Duration::from_millis(self.config.reset_timeout_ms) {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_attempts = 0;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self.half_open_attempts < self.config.half_open_max_attempts,
        }
    }

    /// Record that an attempt is being dispatched while in HALF_OPEN.
    ///
    /// Must be called before the call starts so the probe cap holds even if
    /// the call itself blocks.
    pub fn record_attempt_dispatched(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.half_open_attempts += 1;
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => self.failures = self.failures.saturating_sub(1),
            CircuitState::HalfOpen => {
                self.state = CircuitState::Closed;
                self.failures = 0;
                self.half_open_attempts = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        match self.state {
            CircuitState::Closed => {
                self.failures += 1;
                if self.failures >= self.config.failure_threshold {
                    self.state = CircuitState::Open;
                    self.last_failure_timestamp = Some(now);
                }
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.last_failure_timestamp = Some(now);
                self.half_open_attempts = 0;
            }
            CircuitState::Open => {
                self.last_failure_timestamp = Some(now);
            }
        }
    }
}
