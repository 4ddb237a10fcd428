//! Mock funding source for integration testing.
//!
//! Provides a deterministic `FundingSource` implementation that returns
//! known readings after a configurable delay, can be forced to fail, and
//! counts how often it was called, all in memory with no network.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use funding_monitor::sources::FundingSource;
use funding_monitor::types::{RawReading, SourceError};

/// A mock funding venue for deterministic testing.
pub struct MockSource {
    name: String,
    /// `(venue symbol, rate, price)` triples returned on every call.
    quotes: Vec<(String, Option<f64>, Option<f64>)>,
    delay: Duration,
    calls: Arc<Mutex<u32>>,
    /// If set, every call fails with this message.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockSource {
    pub fn new(name: &str, quotes: &[(&str, f64, Option<f64>)]) -> Self {
        Self {
            name: name.to_string(),
            quotes: quotes
                .iter()
                .map(|(s, r, p)| (s.to_string(), Some(*r), *p))
                .collect(),
            delay: Duration::from_millis(20),
            calls: Arc::new(Mutex::new(0)),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// A venue that answers successfully with nothing listed.
    pub fn empty(name: &str) -> Self {
        Self::new(name, &[])
    }

    /// A venue that takes `delay` to answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Append a reading whose rate failed to parse upstream.
    pub fn with_malformed(mut self, symbol: &str) -> Self {
        self.quotes.push((symbol.to_string(), None, None));
        self
    }

    /// Force all subsequent calls to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FundingSource for MockSource {
    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        *self.calls.lock().unwrap() += 1;
        tokio::time::sleep(self.delay).await;

        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(SourceError::Malformed(err.clone()));
        }

        let now = Utc::now();
        Ok(self
            .quotes
            .iter()
            .map(|(symbol, rate, price)| RawReading {
                source: self.name.clone(),
                instrument: symbol.clone(),
                rate: *rate,
                price: *price,
                fetched_at: now,
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[tokio::test]
async fn test_mock_fetch_readings() {
    let source = MockSource::new("mockex", &[("BTCUSDT", 0.0001, Some(67000.0))]);
    let readings = source.fetch_readings().await.unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].source, "mockex");
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_mock_forced_error() {
    let source = MockSource::new("mockex", &[("BTCUSDT", 0.0001, None)]);
    source.set_error("exchange down");
    assert!(source.fetch_readings().await.is_err());
    source.clear_error();
    assert!(source.fetch_readings().await.is_ok());
}
