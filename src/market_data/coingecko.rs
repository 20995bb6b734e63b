//! CoinGecko market data.
//!
//! Uses the public v3 API: `/coins/list` for the symbol listing and
//! `/simple/price` for batched spot quotes. No API key is required; a demo
//! key raises the rate limit when configured.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::{AssetListing, MarketDataProvider, SpotPrices};

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const USER_AGENT: &str = concat!("coinbook/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct CoinListEntry {
    id: String,
    symbol: String,
    #[serde(default)]
    name: String,
}

pub struct CoinGeckoMarketData {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoMarketData {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: COINGECKO_API_BASE.to_string(),
            api_key: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Demo API key, sent as `x-cg-demo-api-key`.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .query(query)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("CoinGecko request to {path} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("CoinGecko API error on {path}: {status} - {body}"));
        }

        Ok(response)
    }
}

impl Default for CoinGeckoMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for CoinGeckoMarketData {
    async fn list_assets(&self) -> Result<Vec<AssetListing>> {
        let entries: Vec<CoinListEntry> = self
            .get("/coins/list", &[])
            .await?
            .json()
            .await
            .context("Failed to decode CoinGecko coin list")?;

        debug!(count = entries.len(), "coin list fetched");

        Ok(entries
            .into_iter()
            .map(|e| AssetListing {
                id: e.id,
                symbol: e.symbol,
                name: e.name,
            })
            .collect())
    }

    async fn get_price(&self, ids: &[String], vs_currency: &str) -> Result<SpotPrices> {
        if ids.is_empty() {
            return Ok(SpotPrices::new());
        }

        let joined = ids.join(",");
        let vs_currency = vs_currency.to_lowercase();
        // Unknown ids come back as `{}` and unpriced currencies as `null`.
        let raw: HashMap<String, HashMap<String, Option<f64>>> = self
            .get(
                "/simple/price",
                &[("ids", joined.as_str()), ("vs_currencies", vs_currency.as_str())],
            )
            .await?
            .json()
            .await
            .context("Failed to decode CoinGecko simple/price response")?;

        Ok(raw
            .into_iter()
            .map(|(id, quotes)| {
                let quotes = quotes
                    .into_iter()
                    .filter_map(|(currency, price)| {
                        price.filter(|p| p.is_finite()).map(|p| (currency, p))
                    })
                    .collect::<HashMap<_, _>>();
                (id, quotes)
            })
            .filter(|(_, quotes)| !quotes.is_empty())
            .collect())
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
