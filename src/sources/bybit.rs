//! Bybit linear perpetual funding rates.
//!
//! API docs: https://bybit-exchange.github.io/docs/v5/market/tickers
//! Endpoint: `GET /v5/market/tickers?category=linear`
//! Errors come back as HTTP 200 with a non-zero `retCode`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{lenient_number, parse_rows, read_body, FundingSource};
use crate::types::{RawReading, SourceError};

const BASE_URL: &str = "https://api.bybit.com";
const SOURCE_NAME: &str = "bybit";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickersResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Option<TickersResult>,
}

#[derive(Debug, Deserialize)]
struct TickersResult {
    /// Decoded row by row, see `parse_rows`.
    #[serde(default)]
    list: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    #[serde(default, deserialize_with = "lenient_number")]
    funding_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    mark_price: Option<f64>,
}

pub struct BybitClient {
    http: Client,
}

impl BybitClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    fn parse_tickers(body: &str, fetched_at: DateTime<Utc>) -> Result<Vec<RawReading>, SourceError> {
        let resp: TickersResponse = serde_json::from_str(body)?;

        if resp.ret_code != 0 {
            return Err(SourceError::Malformed(format!(
                "retCode {}: {}",
                resp.ret_code, resp.ret_msg
            )));
        }

        let list = resp.result.map(|r| r.list).unwrap_or_default();

        Ok(parse_rows::<Ticker>(SOURCE_NAME, list)
            .into_iter()
            .map(|t| RawReading {
                source: SOURCE_NAME.to_string(),
                instrument: t.symbol,
                rate: t.funding_rate,
                price: t.mark_price,
                fetched_at,
            })
            .collect())
    }
}

#[async_trait]
impl FundingSource for BybitClient {
    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        let url = format!("{BASE_URL}/v5/market/tickers?category=linear");
        debug!(url = %url, "Fetching Bybit linear tickers");

        let resp = self.http.get(&url).send().await?;
        let body = read_body(resp).await?;
        Self::parse_tickers(&body, Utc::now())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tickers() {
        let body = r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "list": [
                    {"symbol":"BTCUSDT","lastPrice":"67000","markPrice":"67001.5","fundingRate":"0.0001","nextFundingTime":"1700000000000"},
                    {"symbol":"SOLPERP","markPrice":"150.2","fundingRate":"-0.0002"}
                ]
            },
            "time": 1700000000000
        }"#;

        let readings = BybitClient::parse_tickers(body, Utc::now()).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].source, "bybit");
        assert_eq!(readings[0].instrument, "BTCUSDT");
        assert_eq!(readings[0].rate, Some(0.0001));
        assert_eq!(readings[0].price, Some(67001.5));
        assert_eq!(readings[1].rate, Some(-0.0002));
    }

    #[test]
    fn test_missing_funding_field_is_absent_rate() {
        let body = r#"{"retCode":0,"retMsg":"OK","result":{"list":[{"symbol":"BTC-26DEC25","markPrice":"70000"}]}}"#;
        let readings = BybitClient::parse_tickers(body, Utc::now()).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].rate, None);
    }

    #[test]
    fn test_bad_row_does_not_drop_batch() {
        let body = r#"{"retCode":0,"retMsg":"OK","result":{"list":[
            {"symbol":"BTCUSDT","markPrice":"67000","fundingRate":"0.0001"},
            {"markPrice":"1","fundingRate":"0.9"},
            {"symbol":"ETHUSDT","markPrice":3500,"fundingRate":0.00015}
        ]}}"#;
        let readings = BybitClient::parse_tickers(body, Utc::now()).unwrap();
        let symbols: Vec<&str> = readings.iter().map(|r| r.instrument.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(readings[1].rate, Some(0.00015));
        assert_eq!(readings[1].price, Some(3500.0));
    }

    #[test]
    fn test_nonzero_ret_code_is_failure() {
        let body = r#"{"retCode":10001,"retMsg":"params error","result":{}}"#;
        let err = BybitClient::parse_tickers(body, Utc::now()).unwrap_err();
        match err {
            SourceError::Malformed(msg) => assert!(msg.contains("10001")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_result_is_empty() {
        let body = r#"{"retCode":0,"retMsg":"OK"}"#;
        let readings = BybitClient::parse_tickers(body, Utc::now()).unwrap();
        assert!(readings.is_empty());
    }

    #[test]
    fn test_garbage_body() {
        assert!(BybitClient::parse_tickers("<html>502</html>", Utc::now()).is_err());
    }
}
