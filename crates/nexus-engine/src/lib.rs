//! Core routing engine: health-aware upstream selection, a per-upstream
//! circuit breaker, and the sequential failover loop that turns a chat
//! request into a committed streaming or non-streaming response.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod backoff;
pub mod breaker;
pub mod discovery;
pub mod error;
pub mod failover;
pub mod health;
pub mod lifecycle;
pub mod metrics;
pub mod pool;
pub mod provider;
pub mod router;
pub mod selector;
pub mod state;
pub mod types;
pub mod upstream;

pub use error::GatewayError;
pub use failover::{FailoverEngine, GatewayEvent, GatewayEventStream};
pub use router::{build_router, health_router};
pub use selector::RoutingMode;
pub use state::EngineState;
pub use upstream::{ProviderKind, TrackedUpstream, UpstreamId};
