//! Exchange account capability.
//!
//! An [`ExchangeClient`] knows how to read one account's balances and how to
//! quote a trading pair. Concrete clients live in the submodules; the
//! [`ExchangeRegistry`] maps a closed set of identifiers to constructors.

pub mod binance;
pub mod coinbase;
pub mod kraken;
mod registry;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use binance::BinanceClient;
pub use coinbase::CoinbaseClient;
pub use kraken::KrakenClient;
pub use registry::{ConnectError, ConnectSettings, ExchangeFactory, ExchangeRegistry, UnknownExchange};

/// Normalized (trimmed, lower-cased) exchange identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix used for environment variables (`BINANCE_API_KEY`, ...).
    pub fn env_prefix(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One line of an account's balance response, in response order.
///
/// `amount` is `None` when the venue reports the asset without a usable total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub asset: String,
    pub amount: Option<f64>,
}

impl BalanceEntry {
    pub fn new(asset: impl Into<String>, amount: Option<f64>) -> Self {
        Self {
            asset: asset.into(),
            amount,
        }
    }
}

/// A `BASE/QUOTE` trading pair, upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Self {
        Self {
            base: base.as_ref().trim().to_uppercase(),
            quote: quote.as_ref().trim().to_uppercase(),
        }
    }

    /// A pair quoting an asset against itself (e.g. `USDT/USDT`) has no market.
    pub fn is_self_quoted(&self) -> bool {
        self.base == self.quote
    }

    /// Reject pairs no venue can quote before spending a request on them.
    pub fn ensure_quotable(&self) -> Result<(), ExchangeError> {
        if self.base.is_empty() || self.quote.is_empty() || self.is_self_quoted() {
            return Err(ExchangeError::UnsupportedPair(self.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, quote)) => Ok(Self::new(base, quote)),
            None => Err(ExchangeError::UnsupportedPair(s.to_string())),
        }
    }
}

/// Most recent trade for a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: String,
    pub last: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("no API credentials configured for {0}")]
    MissingCredentials(ExchangeId),
    #[error("rate limited by exchange")]
    RateLimited,
    #[error("pair {0} is not supported")]
    UnsupportedPair(String),
    #[error("exchange API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("failed to sign request: {0}")]
    Signing(String),
}

impl ExchangeError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => ExchangeError::Auth(body),
            429 | 418 => ExchangeError::RateLimited,
            code => ExchangeError::Api { status: code, body },
        }
    }
}

/// Read a response body, classifying failures and decoding JSON.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ExchangeError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ExchangeError::from_status(status, body));
    }

    serde_json::from_str(&body).map_err(|e| ExchangeError::Decode(e.to_string()))
}

/// Collapse balance lines to one per asset, summing amounts and keeping
/// first-seen order. An absent amount adds nothing.
pub(crate) fn merge_balances(
    entries: impl IntoIterator<Item = BalanceEntry>,
) -> Vec<BalanceEntry> {
    let mut merged: Vec<BalanceEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        match index.get(&entry.asset) {
            Some(&i) => {
                let current = &mut merged[i].amount;
                *current = match (*current, entry.amount) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
            }
            None => {
                index.insert(entry.asset.clone(), merged.len());
                merged.push(entry);
            }
        }
    }
    merged
}

/// Parse a numeric string as exchanges send them (`"0.00100000"`).
pub(crate) fn parse_amount(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[async_trait::async_trait]
pub trait ExchangeClient: Send + Sync {
    fn id(&self) -> &ExchangeId;

    /// Total (free + locked) balance per asset, one entry per asset, in the
    /// venue's natural order.
    async fn fetch_balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError>;

    async fn fetch_ticker(&self, pair: &TradingPair) -> Result<Ticker, ExchangeError>;
}
