use std::collections::HashSet;

use rand::Rng;
use tokio::time::Instant;

use crate::health::{health_score, PriorityTable};
use crate::pool::UpstreamPool;

/// Routing strategy used to pick the next candidate upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingMode {
    #[default]
    Smart,
    Fastest,
    RoundRobin,
}

impl RoutingMode {
    /// Parse the `X-Routing-Mode` header value; anything unrecognized
    /// falls back to `smart`.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some("fastest") => Self::Fastest,
            Some("round-robin" | "round_robin") => Self::RoundRobin,
            _ => Self::Smart,
        }
    }
}

/// Floor applied to every candidate's weight in `smart` mode, so an
/// unmeasured or unattractive upstream is still eventually tried.
const SMART_WEIGHT_FLOOR: f64 = 0.1;

/// Pick the next upstream to attempt, given the already-tried indices for
/// this request. Consulting availability may itself flip a breaker from
/// OPEN to HALF_OPEN.
#[must_use]
pub fn select(
    pool: &UpstreamPool,
    tried: &HashSet<usize>,
    mode: RoutingMode,
    priority: &PriorityTable,
    now: Instant,
) -> Option<usize> {
    let candidates: Vec<usize> = pool
        .iter()
        .filter(|(idx, upstream)| !tried.contains(idx) && upstream.is_enabled())
        .filter(|(_, upstream)| upstream.with_state(|s| s.breaker.is_available(now)))
        .map(|(idx, _)| idx)
        .collect();

    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(candidates[0]);
    }

    match mode {
        RoutingMode::RoundRobin => select_round_robin(pool, &candidates),
        RoutingMode::Fastest => select_fastest(pool, &candidates, priority, now),
        RoutingMode::Smart => select_smart(pool, &candidates, priority, now),
    }
}

fn select_round_robin(pool: &UpstreamPool, candidates: &[usize]) -> Option<usize> {
    let len = pool.len();
    if len == 0 {
        return None;
    }
    let candidate_set: HashSet<usize> = candidates.iter().copied().collect();
    let start = pool.claim_round_robin_ticket() % len;
    (0..len)
        .map(|offset| (start + offset) % len)
        .find(|idx| candidate_set.contains(idx))
}

fn select_fastest(
    pool: &UpstreamPool,
    candidates: &[usize],
    priority: &PriorityTable,
    now: Instant,
) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .map(|idx| {
            let upstream = pool.get(idx).expect("candidate index in bounds");
            let score = upstream.with_state(|s| health_score(s, priority.bonus(upstream.id.provider_kind), now));
            (idx, score)
        })
        .fold(None::<(usize, f64)>, |best, (idx, score)| match best {
            Some((best_idx, best_score)) if best_score >= score => Some((best_idx, best_score)),
            _ => Some((idx, score)),
        })
        .map(|(idx, _)| idx)
}

fn select_smart(
    pool: &UpstreamPool,
    candidates: &[usize],
    priority: &PriorityTable,
    now: Instant,
) -> Option<usize> {
    let weights: Vec<(usize, f64)> = candidates
        .iter()
        .copied()
        .map(|idx| {
            let upstream = pool.get(idx).expect("candidate index in bounds");
            let score = upstream.with_state(|s| health_score(s, priority.bonus(upstream.id.provider_kind), now));
            (idx, score.max(SMART_WEIGHT_FLOOR))
        })
        .collect();

    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return candidates.first().copied();
    }

    let mut pick = rand::rng().random_range(0.0..total);
    for (idx, weight) in &weights {
        if pick < *weight {
            return Some(*idx);
        }
        pick -= weight;
    }
    weights.last().map(|(idx, _)| *idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Adapter, AdapterError, ChunkStream};
    use crate::breaker::{BreakerConfig, CircuitBreaker};
    use crate::types::{ChatMessage, CompletionOptions};
    use crate::upstream::{ProviderKind, TrackedUpstream, UpstreamId};
    use async_trait::async_trait;

    struct NoopAdapter(ProviderKind);

    #[async_trait]
    impl Adapter for NoopAdapter {
        fn provider_kind(&self) -> ProviderKind {
            self.0
        }

        async fn stream(
            &self,
            _messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<ChunkStream, AdapterError> {
            Ok(Box::pin(futures_util::stream::empty()))
        }
    }

    fn pool_of(kinds: &[ProviderKind]) -> UpstreamPool {
        let upstreams = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                TrackedUpstream::new(
                    UpstreamId {
                        provider_kind: *kind,
                        instance_id: (i + 1).to_string(),
                    },
                    Box::new(NoopAdapter(*kind)),
                    0.0,
                    CircuitBreaker::new(BreakerConfig::default()),
                )
            })
            .collect();
        UpstreamPool::new(upstreams)
    }

    #[test]
    fn round_robin_visits_all_before_repeating() {
        let pool = pool_of(&[ProviderKind::Groq, ProviderKind::Gemini, ProviderKind::Cerebras]);
        let priority = PriorityTable::default();
        let now = Instant::now();
        let mut seen = HashSet::new();
        for _ in 0..pool.len() {
            let idx = select(&pool, &HashSet::new(), RoutingMode::RoundRobin, &priority, now).unwrap();
            seen.insert(idx);
        }
        assert_eq!(seen.len(), pool.len());
    }

    #[test]
    fn single_candidate_is_returned_directly() {
        let pool = pool_of(&[ProviderKind::Groq]);
        let priority = PriorityTable::default();
        let now = Instant::now();
        assert_eq!(select(&pool, &HashSet::new(), RoutingMode::Smart, &priority, now), Some(0));
    }

    #[test]
    fn empty_candidate_set_returns_none() {
        let pool = pool_of(&[ProviderKind::Groq]);
        let priority = PriorityTable::default();
        let now = Instant::now();
        let mut tried = HashSet::new();
        tried.insert(0);
        assert_eq!(select(&pool, &tried, RoutingMode::Smart, &priority, now), None);
    }

    #[test]
    fn from_header_falls_back_to_smart() {
        assert_eq!(RoutingMode::from_header(Some("bogus")), RoutingMode::Smart);
        assert_eq!(RoutingMode::from_header(Some("fastest")), RoutingMode::Fastest);
        assert_eq!(RoutingMode::from_header(Some("round-robin")), RoutingMode::RoundRobin);
        assert_eq!(RoutingMode::from_header(None), RoutingMode::Smart);
    }
}
