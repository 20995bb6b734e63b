use serde::{Deserialize, Serialize};

use crate::exchange::{BalanceEntry, ExchangeId};
use crate::pricing::{PriceResolution, PriceSource};

/// A positive balance of one asset on one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetHolding {
    pub exchange: ExchangeId,
    pub asset: String,
    pub amount: f64,
}

impl AssetHolding {
    /// `None` for absent, zero, negative or non-finite amounts.
    pub fn from_entry(exchange: &ExchangeId, entry: BalanceEntry) -> Option<Self> {
        let amount = entry.amount.filter(|a| a.is_finite() && *a > 0.0)?;
        Some(Self {
            exchange: exchange.clone(),
            asset: entry.asset,
            amount,
        })
    }
}

/// One priced line of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetValuation {
    pub exchange: ExchangeId,
    pub asset: String,
    pub amount: f64,
    /// `null` when no price could be resolved.
    pub price_usd: Option<f64>,
    /// `amount * price_usd`, or 0 when unpriced.
    pub value_usd: f64,
    pub price_source: PriceSource,
}

impl AssetValuation {
    pub fn new(holding: AssetHolding, resolution: &PriceResolution) -> Self {
        let price_usd = resolution.price();
        Self {
            value_usd: holding.amount * price_usd.unwrap_or(0.0),
            exchange: holding.exchange,
            asset: holding.asset,
            amount: holding.amount,
            price_usd,
            price_source: resolution.source(),
        }
    }
}

/// What happened to one requested exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExchangeStatus {
    Ok,
    /// Not in the registry; nothing was attempted.
    Unsupported,
    ClientUnavailable { error: String },
    BalanceFetchFailed { error: String },
    /// The request deadline passed before this exchange was started.
    SkippedDeadline,
}

impl ExchangeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ExchangeStatus::Ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub exchange: ExchangeId,
    #[serde(flatten)]
    pub status: ExchangeStatus,
    /// Holdings valued for this exchange.
    pub holdings: usize,
}

impl ExchangeReport {
    pub fn new(exchange: ExchangeId, status: ExchangeStatus) -> Self {
        Self {
            exchange,
            status,
            holdings: 0,
        }
    }
}

/// Consolidated valuation returned for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub total_usd: f64,
    /// Exchange order as requested, asset order as each exchange reported.
    pub details: Vec<AssetValuation>,
    /// Cache TTL in seconds.
    pub cache_ttl: u64,
    /// Unix seconds of the price cache's last reset, 0 if it never ran.
    pub cached_at: f64,
    pub exchanges: Vec<ExchangeReport>,
}
