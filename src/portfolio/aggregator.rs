use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{AssetHolding, AssetValuation, ExchangeReport, ExchangeStatus, PortfolioSnapshot, SnapshotBuilder};
use crate::exchange::{ExchangeFactory, ExchangeId};
use crate::pricing::PriceResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorOptions {
    /// Exchanges processed at once; 1 is strictly sequential.
    pub concurrency: usize,
    /// Overall budget for one request. Exchanges not started by then are
    /// skipped; ones already running finish.
    pub request_timeout: Option<Duration>,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            request_timeout: None,
        }
    }
}

/// Values the balances of a set of exchanges.
///
/// Failures never escape [`BalanceAggregator::aggregate`]: each shows up as
/// an [`ExchangeStatus`] in the snapshot, or as an unpriced valuation.
pub struct BalanceAggregator {
    factory: Arc<dyn ExchangeFactory>,
    resolver: Arc<PriceResolver>,
    options: AggregatorOptions,
}

impl BalanceAggregator {
    pub fn new(factory: Arc<dyn ExchangeFactory>, resolver: Arc<PriceResolver>) -> Self {
        Self {
            factory,
            resolver,
            options: AggregatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    pub async fn aggregate<S: AsRef<str>>(&self, exchanges: &[S]) -> PortfolioSnapshot {
        let deadline = self.options.request_timeout.map(|t| Instant::now() + t);

        let mut seen = HashSet::new();
        let ids: Vec<ExchangeId> = exchanges
            .iter()
            .map(|raw| ExchangeId::new(raw.as_ref()))
            .filter(|id| !id.as_str().is_empty() && seen.insert(id.clone()))
            .collect();

        // `buffered` yields results in input order whatever order they finish in.
        let results: Vec<(ExchangeReport, Vec<AssetValuation>)> = stream::iter(ids)
            .map(|id| self.value_exchange(id, deadline))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut builder = SnapshotBuilder::new();
        for (report, valuations) in results {
            builder.push_exchange(report, valuations);
        }
        let snapshot = builder.build(self.resolver.cache());

        info!(
            exchanges = snapshot.exchanges.len(),
            holdings = snapshot.details.len(),
            total_usd = snapshot.total_usd,
            "portfolio valued"
        );
        snapshot
    }

    async fn value_exchange(
        &self,
        id: ExchangeId,
        deadline: Option<Instant>,
    ) -> (ExchangeReport, Vec<AssetValuation>) {
        if !self.factory.is_supported(&id) {
            debug!(exchange = %id, "skipping unsupported exchange");
            return (ExchangeReport::new(id, ExchangeStatus::Unsupported), Vec::new());
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!(exchange = %id, "request deadline passed; skipping exchange");
            return (ExchangeReport::new(id, ExchangeStatus::SkippedDeadline), Vec::new());
        }

        let client = match self.factory.connect(&id) {
            Ok(client) => client,
            Err(e) => {
                warn!(exchange = %id, error = %e, "failed to build exchange client");
                let status = ExchangeStatus::ClientUnavailable {
                    error: e.to_string(),
                };
                return (ExchangeReport::new(id, status), Vec::new());
            }
        };

        let balances = match client.fetch_balances().await {
            Ok(balances) => balances,
            Err(e) => {
                warn!(exchange = %id, error = %e, "fetch_balances failed");
                let status = ExchangeStatus::BalanceFetchFailed {
                    error: e.to_string(),
                };
                return (ExchangeReport::new(id, status), Vec::new());
            }
        };

        let mut valuations = Vec::new();
        for entry in balances {
            let Some(holding) = AssetHolding::from_entry(&id, entry) else {
                continue;
            };
            let resolution = self.resolver.resolve(&holding.asset, client.as_ref()).await;
            valuations.push(AssetValuation::new(holding, &resolution));
        }

        debug!(exchange = %id, holdings = valuations.len(), "exchange valued");
        let report = ExchangeReport {
            exchange: id,
            status: ExchangeStatus::Ok,
            holdings: valuations.len(),
        };
        (report, valuations)
    }
}
