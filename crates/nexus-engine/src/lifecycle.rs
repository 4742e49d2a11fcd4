//! Process-wide in-flight counter and shutdown latch.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use tokio::time::{Duration, Instant};

/// Default grace period for in-flight requests to drain on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Tracks concurrent chat requests and whether the process is shutting
/// down. Shared across the whole server via `Arc`.
pub struct LifecycleController {
    in_flight: AtomicI64,
    shutting_down: AtomicBool,
    shutdown_timeout: Duration,
}

impl LifecycleController {
    #[must_use]
    pub fn new(shutdown_timeout_ms: u64) -> Self {
        Self {
            in_flight: AtomicI64::new(0),
            shutting_down: AtomicBool::new(false),
            shutdown_timeout: Duration::from_millis(shutdown_timeout_ms),
        }
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The configured drain grace period.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Admit a new request, returning a guard that decrements the
    /// in-flight counter exactly once when dropped. Returns `None` if the
    /// process is already shutting down.
    pub fn admit(self: &Arc<Self>) -> Option<InFlightGuard> {
        if self.is_shutting_down() {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        Some(InFlightGuard {
            controller: Arc::clone(self),
        })
    }

    /// Begin shutdown: stop admitting new requests and wait for in-flight
    /// requests to drain, up to the configured timeout.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);

        let deadline = Instant::now() + self.shutdown_timeout;
        while self.in_flight() > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if self.in_flight() > 0 {
            tracing::warn!(
                in_flight = self.in_flight(),
                "shutdown grace period elapsed with requests still in flight"
            );
        }
    }
}

/// RAII guard that decrements the in-flight counter exactly once on drop,
/// including on cancellation or panic unwinding.
pub struct InFlightGuard {
    controller: Arc<LifecycleController>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.controller.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admit_increments_and_drop_decrements() {
        let controller = Arc::new(LifecycleController::new(DEFAULT_SHUTDOWN_TIMEOUT_MS));
        let guard = controller.admit().expect("not shutting down");
        assert_eq!(controller.in_flight(), 1);
        drop(guard);
        assert_eq!(controller.in_flight(), 0);
    }

    #[test]
    fn shutting_down_rejects_new_requests() {
        let controller = Arc::new(LifecycleController::new(DEFAULT_SHUTDOWN_TIMEOUT_MS));
        controller.shutting_down.store(true, Ordering::Release);
        assert!(controller.admit().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_returns_once_in_flight_drains() {
        let controller = Arc::new(LifecycleController::new(1000));
        let guard = controller.admit().expect("not shutting down");

        let controller_for_shutdown = Arc::clone(&controller);
        let shutdown = tokio::spawn(async move { controller_for_shutdown.shutdown().await });

        tokio::time::advance(Duration::from_millis(60)).await;
        drop(guard);
        tokio::time::advance(Duration::from_millis(60)).await;

        shutdown.await.expect("shutdown task panicked");
        assert_eq!(controller.in_flight(), 0);
    }
}
