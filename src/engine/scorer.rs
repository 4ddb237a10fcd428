//! Opportunity scorer: the ranking policy.
//!
//! Keeps strictly positive funding rates, orders them from highest to
//! lowest (stable on ties), and derives the annualised yield and the
//! display price.

use tracing::debug;

use crate::types::{NormalizedRate, Opportunity};

/// Settlements per day on 8-hour funding venues.
pub const DEFAULT_SETTLEMENTS_PER_DAY: f64 = 3.0;

/// Days used to annualise a per-period funding rate.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// `DEFAULT_SETTLEMENTS_PER_DAY × DAYS_PER_YEAR`.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = DEFAULT_SETTLEMENTS_PER_DAY * DAYS_PER_YEAR;

/// Prefix used when rendering a known price.
pub const PRICE_PREFIX: &str = "$";

/// Marker shown when a source gave no price.
pub const PRICE_UNAVAILABLE: &str = "N/A";

/// Render a price for display, `"N/A"` when absent.
pub fn price_display(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("{PRICE_PREFIX}{p}"),
        None => PRICE_UNAVAILABLE.to_string(),
    }
}

/// Ranks normalised rates into opportunities.
#[derive(Debug, Clone)]
pub struct OpportunityScorer {
    periods_per_year: f64,
}

impl Default for OpportunityScorer {
    fn default() -> Self {
        Self {
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

impl OpportunityScorer {
    pub fn new(periods_per_year: f64) -> Self {
        Self { periods_per_year }
    }

    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// Score one cycle's rates.
    ///
    /// Same input, same output: no I/O, no clock, no randomness.
    pub fn score(&self, rates: &[NormalizedRate]) -> Vec<Opportunity> {
        let mut positives: Vec<&NormalizedRate> = rates.iter().filter(|r| r.rate > 0.0).collect();

        // `sort_by` is stable, so equal rates keep their discovery order.
        positives.sort_by(|a, b| b.rate.total_cmp(&a.rate));

        let opportunities: Vec<Opportunity> = positives
            .into_iter()
            .map(|r| Opportunity {
                instrument: r.instrument.clone(),
                source: r.source.clone(),
                rate: r.rate,
                price: r.price,
                price_display: price_display(r.price),
                annualized_rate: r.rate * self.periods_per_year,
            })
            .collect();

        debug!(
            input = rates.len(),
            positive = opportunities.len(),
            "Opportunities scored"
        );

        opportunities
    }
}
