//! Balance aggregation and the consolidated snapshot.

mod aggregator;
mod models;
mod snapshot;

pub use aggregator::{AggregatorOptions, BalanceAggregator};
pub use models::{AssetHolding, AssetValuation, ExchangeReport, ExchangeStatus, PortfolioSnapshot};
pub use snapshot::SnapshotBuilder;
