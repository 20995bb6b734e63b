//! Symbol -> USD price resolution.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PriceCache;
use crate::clock::{Clock, SystemClock};
use crate::exchange::{ExchangeClient, TradingPair};
use crate::market_data::{MarketDataProvider, SymbolDirectory};

const VS_CURRENCY: &str = "usd";
const FALLBACK_QUOTE: &str = "USDT";

/// Where a valuation's price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Cache,
    MarketData,
    ExchangeTicker,
    Unresolved,
}

/// Outcome of resolving one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceResolution {
    Cached(f64),
    MarketData(f64),
    ExchangeTicker(f64),
    /// Neither tier produced a usable price.
    Unresolved { reason: String },
}

impl PriceResolution {
    pub fn price(&self) -> Option<f64> {
        match self {
            Self::Cached(p) | Self::MarketData(p) | Self::ExchangeTicker(p) => Some(*p),
            Self::Unresolved { .. } => None,
        }
    }

    pub fn source(&self) -> PriceSource {
        match self {
            Self::Cached(_) => PriceSource::Cache,
            Self::MarketData(_) => PriceSource::MarketData,
            Self::ExchangeTicker(_) => PriceSource::ExchangeTicker,
            Self::Unresolved { .. } => PriceSource::Unresolved,
        }
    }
}

fn usable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Resolves USD prices: cache first, then bulk market data, then the
/// exchange's own `{SYMBOL}/USDT` ticker.
///
/// Only market-data prices are cached: a ticker price belongs to the exchange
/// that quoted it. Failures in either tier are logged and folded into
/// [`PriceResolution::Unresolved`].
pub struct PriceResolver {
    cache: Arc<PriceCache>,
    directory: SymbolDirectory,
    clock: Arc<dyn Clock>,
}

impl PriceResolver {
    pub fn new(cache: Arc<PriceCache>, market_data: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            cache,
            directory: SymbolDirectory::new(market_data),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fixed symbol -> market-data id mappings, consulted before the listing.
    pub fn with_symbol_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.directory = self.directory.with_overrides(overrides);
        self
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    pub async fn resolve_price(&self, symbol: &str, exchange: &dyn ExchangeClient) -> Option<f64> {
        self.resolve(symbol, exchange).await.price()
    }

    pub async fn resolve(&self, symbol: &str, exchange: &dyn ExchangeClient) -> PriceResolution {
        let epoch = self.cache.maybe_reset(self.clock.now());
        let symbol = symbol.trim().to_uppercase();

        if let Some(price) = self.cache.lookup(&symbol) {
            debug!(symbol = %symbol, price, "price cache hit");
            return PriceResolution::Cached(price);
        }

        let primary_miss = match self.market_data_price(&symbol, epoch).await {
            Ok(Some(price)) => {
                self.cache.store(&symbol, price);
                return PriceResolution::MarketData(price);
            }
            Ok(None) => "no market data price".to_string(),
            Err(e) => {
                debug!(
                    symbol = %symbol,
                    provider = self.directory.provider().name(),
                    error = %e,
                    "market data lookup failed"
                );
                format!("market data lookup failed: {e}")
            }
        };

        let pair = TradingPair::new(&symbol, FALLBACK_QUOTE);
        match exchange.fetch_ticker(&pair).await {
            Ok(ticker) => match ticker.last.filter(|p| usable(*p)) {
                Some(price) => PriceResolution::ExchangeTicker(price),
                None => PriceResolution::Unresolved {
                    reason: format!("{primary_miss}; {pair} ticker has no usable last price"),
                },
            },
            Err(e) => {
                debug!(
                    exchange = %exchange.id(),
                    pair = %pair,
                    error = %e,
                    "ticker fallback failed"
                );
                PriceResolution::Unresolved {
                    reason: format!("{primary_miss}; {pair} ticker failed: {e}"),
                }
            }
        }
    }

    async fn market_data_price(&self, symbol: &str, epoch: u64) -> Result<Option<f64>> {
        let Some(id) = self.directory.id_for(symbol, epoch).await? else {
            return Ok(None);
        };

        let prices = self
            .directory
            .provider()
            .get_price(std::slice::from_ref(&id), VS_CURRENCY)
            .await?;

        Ok(prices
            .get(&id)
            .and_then(|quotes| quotes.get(VS_CURRENCY))
            .copied()
            .filter(|p| usable(*p)))
    }
}
