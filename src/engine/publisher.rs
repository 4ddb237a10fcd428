//! Snapshot publisher.
//!
//! Builds a `CycleSnapshot` from one cycle's results and swaps it in as a
//! single unit. The store is one `RwLock` around an `Arc`: writers replace
//! the whole `Arc`, readers clone it out and drop the guard immediately, so
//! an opportunity list can never be paired with another cycle's metadata
//! and no reader holds the lock across its own I/O.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{CycleSnapshot, NormalizedRate, Opportunity, SnapshotMetadata};

/// Assemble a snapshot and its metadata from one cycle's pipeline output.
pub fn build_snapshot(
    cycle: u64,
    opportunities: Vec<Opportunity>,
    rates: &[NormalizedRate],
    fetch_latency: Duration,
    generated_at: DateTime<Utc>,
) -> CycleSnapshot {
    let total_instruments_scanned = rates
        .iter()
        .map(|r| r.instrument.as_str())
        .collect::<HashSet<_>>()
        .len();

    let distinct_sources_represented = opportunities
        .iter()
        .map(|o| o.source.as_str())
        .collect::<HashSet<_>>()
        .len();

    let dominant_source = dominant_source(&opportunities);

    CycleSnapshot {
        metadata: SnapshotMetadata {
            cycle,
            generated_at,
            total_instruments_scanned,
            distinct_sources_represented,
            dominant_source,
            opportunity_count: opportunities.len(),
            fetch_latency_ms: fetch_latency.as_millis() as u64,
        },
        opportunities,
    }
}

/// Most frequent source among the opportunities; the first one seen wins a tie.
pub fn dominant_source(opportunities: &[Opportunity]) -> Option<String> {
    // Counts in first-seen order.
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for opp in opportunities {
        match counts.iter_mut().find(|(s, _)| *s == opp.source) {
            Some((_, n)) => *n += 1,
            None => counts.push((opp.source.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (source, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((source, n));
        }
    }
    best.map(|(s, _)| s.to_string())
}

/// Holder of the latest published snapshot.
pub struct SnapshotPublisher {
    current: RwLock<Arc<CycleSnapshot>>,
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotPublisher {
    /// Start with the empty cycle-0 snapshot so readers never wait.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(CycleSnapshot::empty())),
        }
    }

    /// Replace the current snapshot. The previous one is dropped once the
    /// last reader holding it lets go.
    pub async fn publish(&self, snapshot: CycleSnapshot) -> Arc<CycleSnapshot> {
        let snapshot = Arc::new(snapshot);
        {
            let mut guard = self.current.write().await;
            *guard = Arc::clone(&snapshot);
        }
        debug!(
            cycle = snapshot.metadata.cycle,
            opportunities = snapshot.metadata.opportunity_count,
            "Snapshot published"
        );
        snapshot
    }

    /// The most recently published snapshot.
    pub async fn latest(&self) -> Arc<CycleSnapshot> {
        let guard = self.current.read().await;
        Arc::clone(&*guard)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
