#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use coinbook::clock::ManualClock;
use coinbook::exchange::{
    BalanceEntry, ExchangeClient, ExchangeError, ExchangeId, ExchangeRegistry, Ticker, TradingPair,
};
use coinbook::market_data::{AssetListing, MarketDataProvider, SpotPrices};

/// In-memory exchange with call counters.
#[derive(Debug)]
pub struct MockExchange {
    id: ExchangeId,
    balances: Vec<BalanceEntry>,
    tickers: HashMap<String, Option<f64>>,
    balance_error: Option<String>,
    balance_delay: Option<Duration>,
    pub balance_calls: AtomicUsize,
    pub ticker_calls: AtomicUsize,
}

impl MockExchange {
    pub fn new(id: &str) -> Self {
        Self {
            id: ExchangeId::new(id),
            balances: Vec::new(),
            tickers: HashMap::new(),
            balance_error: None,
            balance_delay: None,
            balance_calls: AtomicUsize::new(0),
            ticker_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_balance(mut self, asset: &str, amount: f64) -> Self {
        self.balances.push(BalanceEntry::new(asset, Some(amount)));
        self
    }

    pub fn with_entry(mut self, entry: BalanceEntry) -> Self {
        self.balances.push(entry);
        self
    }

    /// `pair` as `BASE/QUOTE`.
    pub fn with_ticker(mut self, pair: &str, last: Option<f64>) -> Self {
        self.tickers.insert(pair.to_string(), last);
        self
    }

    /// Make `fetch_balances` fail with an auth error.
    pub fn failing(mut self, message: &str) -> Self {
        self.balance_error = Some(message.to_string());
        self
    }

    /// Sleep (tokio time) before answering `fetch_balances`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.balance_delay = Some(delay);
        self
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn id(&self) -> &ExchangeId {
        &self.id
    }

    async fn fetch_balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.balance_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.balance_error {
            Some(message) => Err(ExchangeError::Auth(message.clone())),
            None => Ok(self.balances.clone()),
        }
    }

    async fn fetch_ticker(&self, pair: &TradingPair) -> Result<Ticker, ExchangeError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        pair.ensure_quotable()?;
        match self.tickers.get(&pair.to_string()) {
            Some(last) => Ok(Ticker {
                pair: pair.to_string(),
                last: *last,
            }),
            None => Err(ExchangeError::UnsupportedPair(pair.to_string())),
        }
    }
}

/// In-memory market data with call counters.
#[derive(Debug, Default)]
pub struct MockMarketData {
    listing: Vec<AssetListing>,
    prices: HashMap<String, f64>,
    fail_listing: bool,
    pub list_calls: AtomicUsize,
    pub price_calls: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// List `symbol` under `id`, priced at `usd` when given.
    pub fn with_asset(mut self, id: &str, symbol: &str, usd: Option<f64>) -> Self {
        self.listing.push(AssetListing::new(id, symbol));
        if let Some(price) = usd {
            self.prices.insert(id.to_string(), price);
        }
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    /// Total outbound calls of either kind.
    pub fn calls(&self) -> usize {
        self.list_calls() + self.price_calls()
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketData {
    async fn list_assets(&self) -> Result<Vec<AssetListing>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            anyhow::bail!("listing unavailable");
        }
        Ok(self.listing.clone())
    }

    async fn get_price(&self, ids: &[String], vs_currency: &str) -> Result<SpotPrices> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.prices
                    .get(id)
                    .map(|p| (id.clone(), HashMap::from([(vs_currency.to_string(), *p)])))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Registry whose only exchanges are the given mocks.
pub fn registry_with(exchanges: &[Arc<MockExchange>]) -> ExchangeRegistry {
    exchanges.iter().fold(ExchangeRegistry::new(), |registry, exchange| {
        let exchange = exchange.clone();
        let id = exchange.id().clone();
        registry.register(id, move |_settings| Ok(exchange.clone() as Arc<dyn ExchangeClient>))
    })
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(start_time()))
}
