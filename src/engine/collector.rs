//! Fan-out collector.
//!
//! Calls every registered `FundingSource` concurrently, bounds each call
//! with its own timeout, and folds the outcomes into one `Collection`
//! once every call has settled. A slow or dead source costs the cycle at
//! most one timeout, never N of them.

use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::sources::FundingSource;
use crate::types::{PipelineError, RawReading, SourceError};

/// Everything gathered in one fan-out.
#[derive(Debug, Default)]
pub struct Collection {
    /// Readings from every source that succeeded, in registry order.
    pub readings: Vec<RawReading>,
    /// Per-source failure reasons for this cycle.
    pub failures: BTreeMap<String, SourceError>,
    /// Sources that answered (including with an empty list).
    pub succeeded: Vec<String>,
    pub elapsed: Duration,
}

impl Collection {
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failures.is_empty()
    }
}

/// Concurrent caller over a fixed set of sources.
pub struct FanOutCollector {
    sources: Vec<Arc<dyn FundingSource>>,
    per_source_timeout: Duration,
}

impl FanOutCollector {
    /// Source names key the per-cycle failure map, so each must be unique.
    pub fn new(
        sources: Vec<Arc<dyn FundingSource>>,
        per_source_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.name()) {
                return Err(PipelineError::DuplicateSource(source.name().to_string()));
            }
        }

        Ok(Self {
            sources,
            per_source_timeout,
        })
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run every source once, concurrently.
    ///
    /// Results are merged only after all calls have finished or timed out;
    /// nothing shared is written while calls are in flight.
    pub async fn collect(&self) -> Collection {
        let started = Instant::now();
        let bound = self.per_source_timeout;

        let calls = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let call_started = Instant::now();
                let outcome = match timeout(bound, source.fetch_readings()).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout { after: bound }),
                };
                (source.name().to_string(), outcome, call_started.elapsed())
            }
        });

        let outcomes = join_all(calls).await;

        let mut collection = Collection::default();
        for (name, outcome, took) in outcomes {
            match outcome {
                Ok(batch) => {
                    debug!(
                        source = %name,
                        readings = batch.len(),
                        ms = took.as_millis() as u64,
                        "Source fetched"
                    );
                    collection.readings.extend(batch);
                    collection.succeeded.push(name);
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "Source failed, skipping this cycle");
                    collection.failures.insert(name, e);
                }
            }
        }
        collection.elapsed = started.elapsed();

        if collection.all_failed() {
            warn!(
                failed = collection.failures.len(),
                "Every funding source failed this cycle"
            );
        }

        info!(
            readings = collection.readings.len(),
            succeeded = collection.succeeded.len(),
            failed = collection.failures.len(),
            ms = collection.elapsed.as_millis() as u64,
            "Fan-out complete"
        );

        collection
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
