//! Shared types for the funding monitor.
//!
//! These types form the data model used across all modules: what the
//! source adapters emit, what the normaliser and scorer produce, and
//! what the publisher hands to the dashboard and notifier.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// One funding observation as reported by a source, before normalisation.
///
/// `instrument` is the venue-native symbol (`BTCUSDT`, `BTC_USDT`, `BTC`).
/// `rate` is `None` when the venue sent a value that did not parse; the
/// normaliser drops such readings without touching the rest of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub source: String,
    pub instrument: String,
    /// Funding rate per settlement period as a signed fraction.
    pub rate: Option<f64>,
    /// Mark price, when the venue reports one.
    pub price: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

/// Canonical funding record used by the rest of the pipeline.
///
/// The same instrument may appear once per source that lists it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRate {
    /// Canonical base-asset symbol, comparable across sources.
    pub instrument: String,
    pub source: String,
    pub rate: f64,
    pub price: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// A positive-funding record surfaced by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub instrument: String,
    pub source: String,
    pub rate: f64,
    pub price: Option<f64>,
    /// `"$<price>"` when a price is known, `"N/A"` otherwise.
    pub price_display: String,
    /// `rate × periods_per_year`.
    pub annualized_rate: f64,
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} rate={:.4}% apr={:.2}% price={}",
            self.source,
            self.instrument,
            self.rate * 100.0,
            self.annualized_rate * 100.0,
            self.price_display,
        )
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Cycle-level facts published alongside the opportunity list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotMetadata {
    /// Cycle that produced this snapshot. Zero is the initial empty snapshot.
    pub cycle: u64,
    pub generated_at: DateTime<Utc>,
    /// Distinct canonical instruments seen across every source this cycle.
    pub total_instruments_scanned: usize,
    /// Distinct sources among the opportunities.
    pub distinct_sources_represented: usize,
    /// Source with the most opportunities, first encountered on ties.
    pub dominant_source: Option<String>,
    pub opportunity_count: usize,
    pub fetch_latency_ms: u64,
}

/// The immutable result of one cycle, published as a single unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSnapshot {
    pub opportunities: Vec<Opportunity>,
    pub metadata: SnapshotMetadata,
}

impl CycleSnapshot {
    /// The placeholder visible before the first cycle completes.
    pub fn empty() -> Self {
        Self {
            opportunities: Vec::new(),
            metadata: SnapshotMetadata {
                cycle: 0,
                generated_at: Utc::now(),
                total_instruments_scanned: 0,
                distinct_sources_represented: 0,
                dominant_source: None,
                opportunity_count: 0,
                fetch_latency_ms: 0,
            },
        }
    }
}

impl fmt::Display for CycleSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {} | {} opportunities | {} instruments | {} sources | top: {}",
            self.metadata.cycle,
            self.metadata.opportunity_count,
            self.metadata.total_instruments_scanned,
            self.metadata.distinct_sources_represented,
            self.metadata.dominant_source.as_deref().unwrap_or("N/A"),
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Uniform failure signal for a single source in a single cycle.
///
/// Never fatal: the collector records it and the source is retried on the
/// next cycle.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {after:?}")]
    Timeout { after: Duration },
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Malformed(e.to_string())
    }
}

/// Errors that stop the scheduler loop entirely.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no funding sources registered")]
    NoSources,

    #[error("funding source registered twice: {0}")]
    DuplicateSource(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
