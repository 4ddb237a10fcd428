//! Normaliser: raw venue readings into canonical records.
//!
//! Pure and infallible at the batch level: a malformed reading is dropped
//! on its own and the rest of the batch goes through.

use tracing::debug;

use crate::types::{NormalizedRate, RawReading};

/// Characters venues use between base, quote, and contract-type parts.
const SEPARATORS: [char; 4] = ['-', '_', '/', ':'];

/// Contract-type suffixes stripped before the quote asset.
const CONTRACT_SUFFIXES: [&str; 2] = ["SWAP", "PERP"];

/// Quote assets stripped from the end of a symbol (longest first).
const QUOTE_SUFFIXES: [&str; 3] = ["USDT", "USDC", "USD"];

/// Canonicalise a venue-native symbol to its base asset.
///
/// `BTCUSDT`, `BTC_USDT`, `btc-usdt-swap` and `BTC` all become `BTC`.
/// A symbol that is nothing but a quote asset (`USDT`) is left as is.
pub fn canonical_symbol(raw: &str) -> String {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .collect::<String>()
        .to_uppercase();

    for suffix in CONTRACT_SUFFIXES {
        if s.len() > suffix.len() && s.ends_with(suffix) {
            s.truncate(s.len() - suffix.len());
            break;
        }
    }

    for quote in QUOTE_SUFFIXES {
        if s.len() > quote.len() && s.ends_with(quote) {
            s.truncate(s.len() - quote.len());
            break;
        }
    }

    s
}

/// Normalise one reading, or `None` if it is unusable.
pub fn normalize_reading(reading: RawReading) -> Option<NormalizedRate> {
    let instrument = canonical_symbol(&reading.instrument);
    if instrument.is_empty() {
        debug!(source = %reading.source, raw = %reading.instrument, "Dropping reading with empty symbol");
        return None;
    }

    let rate = match reading.rate {
        Some(r) if r.is_finite() => r,
        _ => {
            debug!(
                source = %reading.source,
                instrument = %instrument,
                "Dropping reading with missing or non-finite rate"
            );
            return None;
        }
    };

    // Only a non-finite price is unrenderable; any finite value is kept as sent.
    let price = reading.price.filter(|p| p.is_finite());

    Some(NormalizedRate {
        instrument,
        source: reading.source,
        rate,
        price,
        observed_at: reading.fetched_at,
    })
}

/// Normalise a whole cycle's readings, keeping input order.
pub fn normalize(readings: Vec<RawReading>) -> Vec<NormalizedRate> {
    let total = readings.len();
    let rates: Vec<NormalizedRate> = readings.into_iter().filter_map(normalize_reading).collect();

    if rates.len() < total {
        debug!(dropped = total - rates.len(), kept = rates.len(), "Malformed readings dropped");
    }

    rates
}
