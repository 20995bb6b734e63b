use crate::pricing::PriceCache;

use super::{AssetValuation, ExchangeReport, PortfolioSnapshot};

/// Collects per-exchange results into a [`PortfolioSnapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    details: Vec<AssetValuation>,
    exchanges: Vec<ExchangeReport>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one exchange's report and valuations, keeping call order.
    pub fn push_exchange(&mut self, report: ExchangeReport, valuations: Vec<AssetValuation>) {
        self.exchanges.push(report);
        self.details.extend(valuations);
    }

    /// `total_usd` is summed here from the details, never carried separately.
    pub fn build(self, cache: &PriceCache) -> PortfolioSnapshot {
        let total_usd = self.details.iter().map(|v| v.value_usd).sum();
        let cached_at = cache
            .last_refreshed()
            .map(|at| at.timestamp_micros() as f64 / 1_000_000.0)
            .unwrap_or(0.0);

        PortfolioSnapshot {
            total_usd,
            details: self.details,
            cache_ttl: cache.ttl().as_secs(),
            cached_at,
            exchanges: self.exchanges,
        }
    }
}
