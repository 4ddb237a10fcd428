//! Gate.io USDT-settled futures funding rates.
//!
//! API docs: https://www.gate.io/docs/developers/apiv4/#futures
//! Endpoint: `GET /api/v4/futures/usdt/contracts`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{lenient_number, parse_rows, read_body, FundingSource};
use crate::types::{RawReading, SourceError};

const BASE_URL: &str = "https://api.gateio.ws";
const SOURCE_NAME: &str = "gate";

#[derive(Debug, Deserialize)]
struct Contract {
    /// e.g. `BTC_USDT`
    name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    funding_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    mark_price: Option<f64>,
    #[serde(default)]
    in_delisting: bool,
}

pub struct GateClient {
    http: Client,
}

impl GateClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Map the contracts list to readings, skipping contracts being delisted.
    fn parse_contracts(
        body: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RawReading>, SourceError> {
        let rows: Vec<Value> = serde_json::from_str(body)?;

        Ok(parse_rows::<Contract>(SOURCE_NAME, rows)
            .into_iter()
            .filter(|c| !c.in_delisting)
            .map(|c| RawReading {
                source: SOURCE_NAME.to_string(),
                instrument: c.name,
                rate: c.funding_rate,
                price: c.mark_price,
                fetched_at,
            })
            .collect())
    }
}

#[async_trait]
impl FundingSource for GateClient {
    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        let url = format!("{BASE_URL}/api/v4/futures/usdt/contracts");
        debug!(url = %url, "Fetching Gate.io futures contracts");

        let resp = self.http.get(&url).send().await?;
        let body = read_body(resp).await?;
        Self::parse_contracts(&body, Utc::now())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}
