//! Hyperliquid perpetuals funding rates.
//!
//! API docs: https://hyperliquid.gitbook.io/hyperliquid-docs/for-developers/api/info-endpoint/perpetuals
//! Endpoint: `POST /info` with `{"type": "metaAndAssetCtxs"}`.
//!
//! The response is a two-element array: the universe metadata and a list of
//! asset contexts in the same order. Hyperliquid settles funding hourly; the
//! rate is passed through as reported.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{lenient_number, parse_row, read_body, FundingSource};
use crate::types::{RawReading, SourceError};

const BASE_URL: &str = "https://api.hyperliquid.xyz";
const SOURCE_NAME: &str = "hyperliquid";

#[derive(Debug, Deserialize)]
struct Meta {
    universe: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Asset {
    name: String,
    #[serde(default)]
    is_delisted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetCtx {
    #[serde(default, deserialize_with = "lenient_number")]
    funding: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    mark_px: Option<f64>,
}

pub struct HyperliquidClient {
    http: Client,
}

impl HyperliquidClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Zip universe and contexts by index. A length mismatch means the two
    /// halves can't be paired reliably, so the whole body is rejected. Each
    /// pair is decoded after zipping, so a bad entry drops only its own asset
    /// and never shifts the pairing of the rest.
    fn parse_meta_and_ctxs(
        body: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RawReading>, SourceError> {
        let (meta, ctxs): (Meta, Vec<Value>) = serde_json::from_str(body)?;

        if meta.universe.len() != ctxs.len() {
            return Err(SourceError::Malformed(format!(
                "universe has {} assets but {} contexts",
                meta.universe.len(),
                ctxs.len()
            )));
        }

        Ok(meta
            .universe
            .into_iter()
            .zip(ctxs)
            .filter_map(|(asset, ctx)| {
                let asset: Asset = parse_row(SOURCE_NAME, asset)?;
                let ctx: AssetCtx = parse_row(SOURCE_NAME, ctx)?;
                Some((asset, ctx))
            })
            .filter(|(asset, _)| !asset.is_delisted)
            .map(|(asset, ctx)| RawReading {
                source: SOURCE_NAME.to_string(),
                instrument: asset.name,
                rate: ctx.funding,
                price: ctx.mark_px,
                fetched_at,
            })
            .collect())
    }
}

#[async_trait]
impl FundingSource for HyperliquidClient {
    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        let url = format!("{BASE_URL}/info");
        debug!(url = %url, "Fetching Hyperliquid asset contexts");

        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "type": "metaAndAssetCtxs" }))
            .send()
            .await?;
        let body = read_body(resp).await?;
        Self::parse_meta_and_ctxs(&body, Utc::now())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}
