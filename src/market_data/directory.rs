//! Symbol -> provider id lookup.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::debug;

use super::MarketDataProvider;

struct Listing {
    epoch: u64,
    ids: HashMap<String, String>,
}

/// Resolves upper-case symbols to market-data ids.
///
/// The provider's asset listing is fetched at most once per cache epoch; a
/// caller passing a new epoch (the price cache was reset) triggers a refetch.
/// Configured overrides win over the listing and never need it.
pub struct SymbolDirectory {
    provider: Arc<dyn MarketDataProvider>,
    overrides: HashMap<String, String>,
    listing: Mutex<Option<Listing>>,
}

impl SymbolDirectory {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            overrides: HashMap::new(),
            listing: Mutex::new(None),
        }
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides
            .into_iter()
            .map(|(symbol, id)| (symbol.trim().to_uppercase(), id))
            .collect();
        self
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    /// Id for `symbol`, or `None` if the provider does not list it.
    ///
    /// Fails only when the listing has to be fetched and the fetch fails; the
    /// failure is not remembered, so the next call retries.
    pub async fn id_for(&self, symbol: &str, epoch: u64) -> Result<Option<String>> {
        let symbol = symbol.trim().to_uppercase();
        if let Some(id) = self.overrides.get(&symbol) {
            return Ok(Some(id.clone()));
        }

        let mut guard = self.listing.lock().await;
        let current = guard.as_ref().filter(|l| l.epoch == epoch);
        if let Some(listing) = current {
            return Ok(listing.ids.get(&symbol).cloned());
        }

        let assets = self.provider.list_assets().await?;
        let mut ids = HashMap::with_capacity(assets.len());
        // Duplicate symbols: the later listing entry wins.
        for asset in assets {
            ids.insert(asset.symbol.to_uppercase(), asset.id);
        }
        debug!(
            provider = self.provider.name(),
            epoch,
            symbols = ids.len(),
            "symbol listing refreshed"
        );

        let id = ids.get(&symbol).cloned();
        *guard = Some(Listing { epoch, ids });
        Ok(id)
    }
}
