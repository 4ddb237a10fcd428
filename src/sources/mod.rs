//! Funding rate sources.
//!
//! Defines the `FundingSource` trait and provides implementations for:
//! - Binance USDⓈ-M futures (`/fapi/v1/premiumIndex`)
//! - Bybit linear perpetuals (`/v5/market/tickers`)
//! - Gate.io USDT futures (`/api/v4/futures/usdt/contracts`)
//! - Hyperliquid perpetuals (`/info` `metaAndAssetCtxs`)
//!
//! Every adapter turns its venue's transport, status and body errors into a
//! `SourceError`. Retries are not done here; a failed source is simply asked
//! again on the next cycle.

pub mod binance;
pub mod bybit;
pub mod gate;
pub mod hyperliquid;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SourcesConfig;
use crate::types::{RawReading, SourceError};

/// Longest response body excerpt kept in a `SourceError::Status`.
const MAX_ERROR_BODY: usize = 200;

/// Abstraction over funding rate venues.
///
/// An empty `Ok` is a valid answer (the venue listed nothing), distinct from
/// an `Err`.
#[async_trait]
pub trait FundingSource: Send + Sync {
    /// Fetch the current funding reading for every listed perpetual.
    async fn fetch_readings(&self) -> std::result::Result<Vec<RawReading>, SourceError>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}

/// Build the shared HTTP client used by every adapter.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .context("Failed to build HTTP client for funding sources")
}

/// Instantiate every source enabled in config, in a fixed order.
pub fn build_sources(cfg: &SourcesConfig) -> Result<Vec<Arc<dyn FundingSource>>> {
    let http = build_http_client(&cfg.user_agent, cfg.timeout())?;
    let mut sources: Vec<Arc<dyn FundingSource>> = Vec::new();

    if cfg.binance {
        sources.push(Arc::new(binance::BinanceClient::new(http.clone())));
    }
    if cfg.bybit {
        sources.push(Arc::new(bybit::BybitClient::new(http.clone())));
    }
    if cfg.gate {
        sources.push(Arc::new(gate::GateClient::new(http.clone())));
    }
    if cfg.hyperliquid {
        sources.push(Arc::new(hyperliquid::HyperliquidClient::new(http)));
    }

    info!(
        sources = ?sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
        "Funding sources registered"
    );

    Ok(sources)
}

/// Read a response body, turning a non-2xx status into `SourceError::Status`.
pub(crate) async fn read_body(resp: reqwest::Response) -> std::result::Result<String, SourceError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY),
        });
    }

    Ok(body)
}

/// Parse a venue numeric field. Venues send numbers as strings; blanks and
/// garbage come back as `None`.
pub(crate) fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
}

/// Serde adapter for venue numbers, which arrive as strings, bare numbers,
/// or null. Anything unusable becomes `None` instead of failing the row.
pub(crate) fn lenient_number<'de, D>(de: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::String(s)) => parse_number(Some(&s)),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    })
}

/// Decode a single row, logging and returning `None` if its shape is wrong.
pub(crate) fn parse_row<T: DeserializeOwned>(source: &str, row: Value) -> Option<T> {
    match serde_json::from_value(row) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(source, error = %e, "Skipping malformed row");
            None
        }
    }
}

/// Decode rows one at a time so a bad row costs only itself.
pub(crate) fn parse_rows<T: DeserializeOwned>(source: &str, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| parse_row(source, row))
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
