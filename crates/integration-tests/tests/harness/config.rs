//! Programmatic configuration builder for integration tests.
//!
//! Upstreams are injected directly as pre-discovered instances rather than
//! through environment variables, so concurrently-running tests never race
//! on process-global env state.

use std::net::SocketAddr;

use nexus_config::{Config, ProviderOverride, ServerConfig};
use nexus_engine::discovery::DiscoveredUpstream;
use nexus_engine::{ProviderKind, UpstreamId};
use secrecy::SecretString;

pub struct ConfigBuilder {
    config: Config,
    discovered: Vec<DiscoveredUpstream>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                ..Config::default()
            },
            discovered: Vec::new(),
        }
    }

    /// Register an upstream instance whose base URL points at a mock
    /// server. Provider overrides are keyed by `provider_kind`, so two
    /// instances of the same kind share one mock.
    pub fn with_upstream(mut self, kind: ProviderKind, instance_id: &str, base_url: &str) -> Self {
        self.config.providers.push(ProviderOverride {
            provider_kind: kind.to_string(),
            base_url: Some(base_url.parse().expect("valid mock base url")),
        });
        self.discovered.push(DiscoveredUpstream {
            id: UpstreamId {
                provider_kind: kind,
                instance_id: instance_id.to_owned(),
            },
            api_key: SecretString::from("test-key"),
        });
        self
    }

    pub fn with_master_key(mut self, key: &str) -> Self {
        self.config.server.master_key = Some(SecretString::from(key));
        self
    }

    pub fn with_breaker(mut self, failure_threshold: u32, reset_timeout_ms: u64) -> Self {
        self.config.breaker.failure_threshold = failure_threshold;
        self.config.breaker.reset_timeout_ms = reset_timeout_ms;
        self
    }

    pub fn with_first_token_timeout_ms(mut self, ms: u64) -> Self {
        self.config.failover.first_token_timeout_ms = ms;
        self
    }

    pub fn with_backoff_initial_ms(mut self, ms: u64) -> Self {
        self.config.failover.backoff_initial_ms = ms;
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.config.failover.shutdown_timeout_ms = ms;
        self
    }

    pub fn build(self) -> (Config, Vec<DiscoveredUpstream>) {
        (self.config, self.discovered)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
