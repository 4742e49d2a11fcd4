#![allow(clippy::must_use_candidate)]

pub mod breaker;
pub mod cors;
mod env;
pub mod failover;
pub mod health;
mod loader;
pub mod priority;
pub mod providers;
pub mod server;

use serde::Deserialize;

pub use breaker::BreakerConfig;
pub use cors::*;
pub use failover::FailoverConfig;
pub use health::*;
pub use priority::PriorityConfig;
pub use providers::ProviderOverride;
pub use server::*;

/// Top-level gateway configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default)]
    pub providers: Vec<ProviderOverride>,
}
