use std::sync::atomic::{AtomicUsize, Ordering};

use crate::upstream::TrackedUpstream;

/// The process-wide ordered sequence of tracked upstreams.
///
/// Created once at startup and never resized; sorted by descending
/// provider priority, then ascending instance-id numeric value, so the
/// order anchors round-robin rotation and selection tie-breaks.
pub struct UpstreamPool {
    upstreams: Vec<TrackedUpstream>,
    round_robin_cursor: AtomicUsize,
}

impl UpstreamPool {
    #[must_use]
    pub fn new(mut upstreams: Vec<TrackedUpstream>) -> Self {
        upstreams.sort_by(|a, b| {
            b.priority_bonus
                .partial_cmp(&a.priority_bonus)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_id: u64 = a.id.instance_id.parse().unwrap_or(0);
                    let b_id: u64 = b.id.instance_id.parse().unwrap_or(0);
                    a_id.cmp(&b_id)
                })
        });
        Self {
            upstreams,
            round_robin_cursor: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TrackedUpstream> {
        self.upstreams.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TrackedUpstream)> {
        self.upstreams.iter().enumerate()
    }

    #[must_use]
    pub fn find_index_by_name(&self, display_name: &str) -> Option<usize> {
        self.upstreams
            .iter()
            .position(|u| u.display_name() == display_name)
    }

    /// Claim the next round-robin ticket. Callers reduce this modulo the
    /// pool length to get a starting scan position; the raw ticket keeps
    /// increasing so concurrent callers never claim the same starting
    /// point twice.
    pub fn claim_round_robin_ticket(&self) -> usize {
        self.round_robin_cursor.fetch_add(1, Ordering::Relaxed)
    }
}
