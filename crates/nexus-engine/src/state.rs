//! Process-wide gateway state: the upstream pool, the failover engine that
//! shares it, and the lifecycle controller that gates new admissions.

use std::sync::Arc;

use secrecy::SecretString;

use crate::backoff::BackoffConfig;
use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::discovery::DiscoveredUpstream;
use crate::failover::FailoverEngine;
use crate::health::PriorityTable;
use crate::lifecycle::LifecycleController;
use crate::pool::UpstreamPool;
use crate::provider::gemini::{self, GeminiAdapter};
use crate::provider::openai_compat;
use crate::upstream::{ProviderKind, TrackedUpstream};

/// Everything a request handler needs, bundled behind one `Arc`.
pub struct EngineState {
    pub pool: Arc<UpstreamPool>,
    pub failover: Arc<FailoverEngine>,
    pub lifecycle: Arc<LifecycleController>,
    pub master_key: Option<SecretString>,
}

impl EngineState {
    /// Build the engine from discovered upstream credentials and loaded
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no upstream credentials were discovered, a
    /// provider override names an invalid base URL, or a base URL is
    /// otherwise unparsable.
    pub fn build(discovered: Vec<DiscoveredUpstream>, config: &nexus_config::Config) -> anyhow::Result<Arc<Self>> {
        if discovered.is_empty() {
            anyhow::bail!(
                "no upstream credentials discovered; set at least one <PROVIDER>_KEY_<N> environment variable"
            );
        }

        let priority = build_priority_table(&config.priority);
        let breaker_config = BreakerConfig {
            failure_threshold: config.breaker.failure_threshold,
            reset_timeout_ms: config.breaker.reset_timeout_ms,
            half_open_max_attempts: config.breaker.half_open_max_attempts,
        };
        let base_url_overrides = build_base_url_overrides(&config.providers);

        let upstreams = discovered
            .into_iter()
            .map(|d| build_tracked_upstream(d, &priority, breaker_config, &base_url_overrides))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let pool = Arc::new(UpstreamPool::new(upstreams));

        let backoff = BackoffConfig {
            initial_delay_ms: config.failover.backoff_initial_ms,
            multiplier: config.failover.backoff_multiplier,
            max_delay_ms: config.failover.backoff_max_ms,
        };
        let failover = Arc::new(FailoverEngine::new(
            Arc::clone(&pool),
            priority,
            backoff,
            config.failover.first_token_timeout_ms,
        ));
        let lifecycle = Arc::new(LifecycleController::new(config.failover.shutdown_timeout_ms));

        Ok(Arc::new(Self {
            pool,
            failover,
            lifecycle,
            master_key: config.server.master_key.clone(),
        }))
    }
}

fn build_priority_table(config: &nexus_config::PriorityConfig) -> PriorityTable {
    let mut table = PriorityTable::default();
    for (name, bonus) in config.overrides() {
        if let Ok(kind) = name.parse::<ProviderKind>() {
            table.set_bonus(kind, *bonus);
        }
    }
    table
}

fn build_base_url_overrides(overrides: &[nexus_config::ProviderOverride]) -> Vec<(ProviderKind, url::Url)> {
    overrides
        .iter()
        .filter_map(|o| {
            let kind = o.provider_kind.parse::<ProviderKind>().ok()?;
            let url = o.base_url.clone()?;
            Some((kind, url))
        })
        .collect()
}

fn build_tracked_upstream(
    discovered: DiscoveredUpstream,
    priority: &PriorityTable,
    breaker_config: BreakerConfig,
    base_url_overrides: &[(ProviderKind, url::Url)],
) -> anyhow::Result<TrackedUpstream> {
    let kind = discovered.id.provider_kind;
    let base_url_override = base_url_overrides.iter().find(|(k, _)| *k == kind).map(|(_, u)| u);

    let adapter: Box<dyn crate::adapter::Adapter> = if kind == ProviderKind::Gemini {
        let base_url = base_url_override.map_or(gemini::DEFAULT_BASE_URL, url::Url::as_str);
        Box::new(GeminiAdapter::new(base_url, discovered.api_key)?)
    } else {
        let base_url = base_url_override.map_or_else(|| openai_compat::default_base_url(kind), url::Url::as_str);
        Box::new(openai_compat::OpenAiCompatAdapter::new(kind, base_url, discovered.api_key)?)
    };

    let priority_bonus = priority.bonus(kind);
    let breaker = CircuitBreaker::new(breaker_config);
    Ok(TrackedUpstream::new(discovered.id, adapter, priority_bonus, breaker))
}
