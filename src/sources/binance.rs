//! Binance USDⓈ-M futures funding rates.
//!
//! API docs: https://developers.binance.com/docs/derivatives/usds-margined-futures
//! Endpoint: `GET /fapi/v1/premiumIndex` (all symbols when `symbol` is omitted)
//! Settlement: every 8 hours on most contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{lenient_number, parse_rows, read_body, FundingSource};
use crate::types::{RawReading, SourceError};

const BASE_URL: &str = "https://fapi.binance.com";
const SOURCE_NAME: &str = "binance";

/// One element of the `premiumIndex` array. Only the fields we use.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    symbol: String,
    #[serde(default, deserialize_with = "lenient_number")]
    mark_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    last_funding_rate: Option<f64>,
}

pub struct BinanceClient {
    http: Client,
}

impl BinanceClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Map a `premiumIndex` body to readings. Only a body that is not an
    /// array fails; rows that don't fit are skipped one by one.
    fn parse_premium_index(
        body: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RawReading>, SourceError> {
        let rows: Vec<Value> = serde_json::from_str(body)?;

        Ok(parse_rows::<PremiumIndex>(SOURCE_NAME, rows)
            .into_iter()
            .map(|e| RawReading {
                source: SOURCE_NAME.to_string(),
                instrument: e.symbol,
                rate: e.last_funding_rate,
                price: e.mark_price,
                fetched_at,
            })
            .collect())
    }
}

#[async_trait]
impl FundingSource for BinanceClient {
    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        let url = format!("{BASE_URL}/fapi/v1/premiumIndex");
        debug!(url = %url, "Fetching Binance premium index");

        let resp = self.http.get(&url).send().await?;
        let body = read_body(resp).await?;
        Self::parse_premium_index(&body, Utc::now())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}
