//! Consolidated USD valuation of crypto exchange balances.
//!
//! [`PortfolioService`] reads each requested exchange's balances, prices
//! every holding (bulk market data first, the exchange's own ticker as a
//! fallback, both behind a shared TTL cache) and returns a
//! [`PortfolioSnapshot`].

pub mod clock;
pub mod config;
pub mod credentials;
pub mod duration;
pub mod exchange;
pub mod format;
pub mod market_data;
pub mod portfolio;
pub mod pricing;
pub mod service;

pub use portfolio::{ExchangeStatus, PortfolioSnapshot};
pub use service::PortfolioService;
