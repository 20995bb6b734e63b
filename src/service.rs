//! Wiring from [`Config`] to a ready [`BalanceAggregator`].
//!
//! Both the CLI and the HTTP server go through [`PortfolioService`]; the
//! price cache it owns lives as long as the service, so repeated requests
//! share it.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::{Config, HttpConfig};
use crate::credentials::{CredentialSource, EnvCredentials};
use crate::exchange::{ExchangeFactory, ExchangeId, ExchangeRegistry};
use crate::market_data::{CoinGeckoMarketData, MarketDataProvider};
use crate::portfolio::{AggregatorOptions, BalanceAggregator, PortfolioSnapshot};
use crate::pricing::{PriceCache, PriceResolver};

const USER_AGENT: &str = concat!("coinbook/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for every outbound call.
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

pub struct PortfolioService {
    factory: Arc<dyn ExchangeFactory>,
    aggregator: BalanceAggregator,
    cache: Arc<PriceCache>,
}

impl PortfolioService {
    /// Build from config, reading exchange credentials from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_credentials(config, Arc::new(EnvCredentials::new()))
    }

    pub fn from_config_with_credentials(
        config: &Config,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self> {
        config.validate()?;
        let http = build_http_client(&config.http)?;

        let mut registry = ExchangeRegistry::builtin()
            .with_http_client(http.clone())
            .with_credentials(credentials);
        for (id, exchange) in &config.exchanges {
            if let Some(base_url) = &exchange.base_url {
                registry = registry
                    .with_base_url(id.as_str(), base_url.clone())
                    .context("Invalid [exchanges] section in config")?;
            }
        }

        let mut market_data = CoinGeckoMarketData::with_client(http);
        if let Some(base_url) = &config.market_data.base_url {
            market_data = market_data.with_base_url(base_url.clone());
        }
        if let Some(api_key) = &config.market_data.api_key {
            market_data = market_data.with_api_key(api_key.clone());
        }

        let cache = Arc::new(PriceCache::new(config.cache.ttl).with_expiry(config.cache.expiry));
        debug!(
            ttl_secs = config.cache.ttl.as_secs(),
            expiry = ?config.cache.expiry,
            "price cache configured"
        );

        let resolver = PriceResolver::new(cache.clone(), Arc::new(market_data))
            .with_symbol_overrides(config.market_data.symbol_overrides.clone());
        let options = AggregatorOptions {
            concurrency: config.aggregator.concurrency,
            request_timeout: config.aggregator.request_timeout,
        };

        Ok(Self::from_resolver(Arc::new(registry), Arc::new(resolver)).with_options(options))
    }

    /// Assemble from explicit collaborators (tests, embedding).
    pub fn from_parts(
        factory: Arc<dyn ExchangeFactory>,
        market_data: Arc<dyn MarketDataProvider>,
        cache: Arc<PriceCache>,
    ) -> Self {
        let resolver = PriceResolver::new(cache, market_data);
        Self::from_resolver(factory, Arc::new(resolver))
    }

    pub fn from_resolver(factory: Arc<dyn ExchangeFactory>, resolver: Arc<PriceResolver>) -> Self {
        let cache = resolver.cache().clone();
        Self {
            aggregator: BalanceAggregator::new(factory.clone(), resolver),
            factory,
            cache,
        }
    }

    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.aggregator = self.aggregator.with_options(options);
        self
    }

    pub fn options(&self) -> &AggregatorOptions {
        self.aggregator.options()
    }

    /// Value the balances held on `exchanges`. Never fails: problems are
    /// reported per exchange inside the snapshot.
    pub async fn portfolio_value<S: AsRef<str>>(&self, exchanges: &[S]) -> PortfolioSnapshot {
        self.aggregator.aggregate(exchanges).await
    }

    pub fn supported_exchanges(&self) -> Vec<ExchangeId> {
        self.factory.supported()
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }
}
