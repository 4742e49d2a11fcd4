//! Structured logging for the gateway process.
//!
//! Sets up a `tracing-subscriber` registry with an `env-filter` layer and a
//! compact `fmt` layer. No metrics or trace export backend is in scope for
//! this system — see `DESIGN.md` for the rationale.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `log_filter` is an `env-filter` directive string (e.g. `"info"` or
/// `"nexus_engine=debug,info"`); falls back to `"info"` if it fails to
/// parse.
pub fn init(log_filter: &str) {
    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
