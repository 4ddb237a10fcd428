//! Cycle scheduler: the fetch → aggregate → publish loop.
//!
//! One cycle at a time: the next fan-out never starts before the previous
//! snapshot is published. After each cycle the loop sleeps for whatever is
//! left of the interval; an overrunning cycle is followed immediately by
//! the next one, never skipped.
//!
//! Phases: `Idle → Fetching → Aggregating → Publishing → Sleeping → Fetching …`,
//! ending in `Stopped` once the shutdown channel flips.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use super::collector::FanOutCollector;
use super::normalizer;
use super::publisher::{build_snapshot, SnapshotPublisher};
use super::scorer::OpportunityScorer;
use crate::notify::Notifier;
use crate::types::{CycleSnapshot, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Aggregating,
    Publishing,
    Sleeping,
    Stopped,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Aggregating => "aggregating",
            CyclePhase::Publishing => "publishing",
            CyclePhase::Sleeping => "sleeping",
            CyclePhase::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Summary of one completed cycle, for the console log.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub readings: usize,
    pub instruments: usize,
    pub opportunities: usize,
    pub failed_sources: Vec<String>,
    pub fetch_latency: Duration,
    /// Fetch + aggregate + publish wall time.
    pub elapsed: Duration,
    pub snapshot: Arc<CycleSnapshot>,
}

/// Time to wait after a cycle that took `elapsed`: `max(0, interval − elapsed)`.
pub fn sleep_after(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Sleep for `pause`, waking early only for a real stop request.
///
/// Returns `false` when the loop should stop: the flag turned true or the
/// sender was dropped. A notification that leaves the flag false resumes
/// the sleep toward the original deadline.
async fn sleep_until_next_cycle(pause: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let wake_at = Instant::now() + pause;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(wake_at) => return true,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    info!("Shutdown channel closed");
                    return false;
                }
                if *shutdown.borrow() {
                    return false;
                }
                debug!("Shutdown flag still clear, resuming sleep");
            }
        }
    }
}

pub struct CycleScheduler {
    collector: FanOutCollector,
    scorer: OpportunityScorer,
    publisher: Arc<SnapshotPublisher>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    console_top_n: usize,
    phase: CyclePhase,
    cycle: u64,
}

impl CycleScheduler {
    pub fn new(
        collector: FanOutCollector,
        scorer: OpportunityScorer,
        publisher: Arc<SnapshotPublisher>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            collector,
            scorer,
            publisher,
            notifier,
            interval,
            console_top_n: 20,
            phase: CyclePhase::Idle,
            cycle: 0,
        }
    }

    /// How many opportunities the per-cycle summary lists at debug level.
    pub fn with_console_top_n(mut self, n: usize) -> Self {
        self.console_top_n = n;
        self
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycle
    }

    fn enter(&mut self, phase: CyclePhase) {
        debug!(from = %self.phase, to = %phase, cycle = self.cycle, "Phase transition");
        self.phase = phase;
    }

    /// Run one fetch → aggregate → publish pass.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let cycle = self.cycle + 1;

        self.enter(CyclePhase::Fetching);
        let collection = self.collector.collect().await;
        let fetch_latency = collection.elapsed;
        let readings = collection.readings.len();
        let failed_sources: Vec<String> = collection.failures.keys().cloned().collect();

        self.enter(CyclePhase::Aggregating);
        let rates = normalizer::normalize(collection.readings);
        let opportunities = self.scorer.score(&rates);
        let snapshot = build_snapshot(cycle, opportunities, &rates, fetch_latency, Utc::now());

        self.enter(CyclePhase::Publishing);
        let snapshot = self.publisher.publish(snapshot).await;
        self.notifier.notify(&snapshot.opportunities).await;

        self.cycle = cycle;

        CycleReport {
            cycle,
            readings,
            instruments: snapshot.metadata.total_instruments_scanned,
            opportunities: snapshot.metadata.opportunity_count,
            failed_sources,
            fetch_latency,
            elapsed: started.elapsed(),
            snapshot,
        }
    }

    /// Drive cycles until `shutdown` turns true (or its sender is dropped).
    ///
    /// A stop request is honoured at the next cycle boundary and cuts short
    /// a pending sleep. An in-flight fan-out is left to settle first.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), PipelineError> {
        if self.collector.source_count() == 0 {
            return Err(PipelineError::NoSources);
        }

        info!(
            interval_ms = self.interval.as_millis() as u64,
            sources = ?self.collector.source_names(),
            periods_per_year = self.scorer.periods_per_year(),
            "Entering cycle loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_cycle().await;
            self.log_cycle_report(&report);

            let pause = sleep_after(self.interval, report.elapsed);
            if pause.is_zero() {
                debug!(
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Cycle overran interval, starting next immediately"
                );
                continue;
            }

            self.enter(CyclePhase::Sleeping);
            if !sleep_until_next_cycle(pause, &mut shutdown).await {
                break;
            }
        }

        self.enter(CyclePhase::Stopped);
        info!(cycles = self.cycle, "Cycle loop stopped");
        Ok(())
    }

    /// Per-cycle console summary.
    fn log_cycle_report(&self, report: &CycleReport) {
        info!(
            cycle = report.cycle,
            latency_ms = report.elapsed.as_millis() as u64,
            fetch_ms = report.fetch_latency.as_millis() as u64,
            readings = report.readings,
            instruments = report.instruments,
            opportunities = report.opportunities,
            failed_sources = ?report.failed_sources,
            top_source = report.snapshot.metadata.dominant_source.as_deref().unwrap_or("N/A"),
            "Cycle complete"
        );

        for (rank, opp) in report
            .snapshot
            .opportunities
            .iter()
            .take(self.console_top_n)
            .enumerate()
        {
            debug!(rank = rank + 1, "{opp}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
