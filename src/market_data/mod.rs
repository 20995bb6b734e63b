//! Bulk market-data capability.
//!
//! A [`MarketDataProvider`] lists the assets it knows (symbol plus provider
//! id) and quotes spot prices for a batch of ids. [`SymbolDirectory`] turns
//! the listing into a symbol lookup that is refreshed once per cache epoch.

mod coingecko;
mod directory;

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use coingecko::CoinGeckoMarketData;
pub use directory::SymbolDirectory;

/// One asset known to a market-data provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetListing {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
}

impl AssetListing {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: String::new(),
        }
    }
}

/// `id -> (currency -> price)`, as returned by a spot price query.
pub type SpotPrices = HashMap<String, HashMap<String, f64>>;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Every asset the provider can price, in listing order.
    async fn list_assets(&self) -> Result<Vec<AssetListing>>;

    /// Spot prices for `ids` in `vs_currency` (lower-case, e.g. `usd`).
    ///
    /// Ids the provider has no price for are absent from the result.
    async fn get_price(&self, ids: &[String], vs_currency: &str) -> Result<SpotPrices>;

    fn name(&self) -> &str;
}
