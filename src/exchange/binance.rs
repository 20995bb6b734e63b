//! Binance spot REST client.
//!
//! Signed endpoints use HMAC-SHA256 over the query string, hex encoded, with
//! the key in the `X-MBX-APIKEY` header.

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use super::{
    merge_balances, parse_amount, read_json, BalanceEntry, ConnectSettings, ExchangeClient,
    ExchangeError, ExchangeId, Ticker, TradingPair,
};
use crate::credentials::ExchangeCredentials;

type HmacSha256 = Hmac<Sha256>;

const BINANCE_API_BASE: &str = "https://api.binance.com";
const RECV_WINDOW_MS: u64 = 5000;
/// Binance error code for an unknown trading symbol.
const INVALID_SYMBOL: i64 = -1121;

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    code: i64,
    msg: String,
}

pub struct BinanceClient {
    id: ExchangeId,
    client: reqwest::Client,
    base_url: String,
    credentials: Option<ExchangeCredentials>,
}

impl BinanceClient {
    pub fn new(credentials: Option<ExchangeCredentials>) -> Self {
        Self {
            id: ExchangeId::new("binance"),
            client: reqwest::Client::new(),
            base_url: BINANCE_API_BASE.to_string(),
            credentials,
        }
    }

    pub fn from_settings(settings: ConnectSettings) -> Self {
        Self {
            id: settings.id,
            client: settings.http,
            base_url: settings
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| BINANCE_API_BASE.to_string()),
            credentials: settings.credentials,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn sign(secret: &str, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// `BTC/USDT` -> `BTCUSDT`.
    fn venue_symbol(pair: &TradingPair) -> String {
        format!("{}{}", pair.base, pair.quote)
    }
}

#[async_trait::async_trait]
impl ExchangeClient for BinanceClient {
    fn id(&self) -> &ExchangeId {
        &self.id
    }

    async fn fetch_balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ExchangeError::MissingCredentials(self.id.clone()))?;

        let query = format!(
            "omitZeroBalances=true&recvWindow={}&timestamp={}",
            RECV_WINDOW_MS,
            Utc::now().timestamp_millis()
        );
        let signature = Self::sign(credentials.api_secret.expose_secret(), &query)?;
        let url = format!(
            "{}/api/v3/account?{}&signature={}",
            self.base_url, query, signature
        );

        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &credentials.api_key)
            .send()
            .await?;
        let account: AccountResponse = read_json(response).await?;

        Ok(merge_balances(account.balances.into_iter().map(|b| {
            let total = match (parse_amount(&b.free), parse_amount(&b.locked)) {
                (Some(free), Some(locked)) => Some(free + locked),
                (Some(free), None) => Some(free),
                (None, Some(locked)) => Some(locked),
                (None, None) => None,
            };
            BalanceEntry::new(b.asset, total)
        })))
    }

    async fn fetch_ticker(&self, pair: &TradingPair) -> Result<Ticker, ExchangeError> {
        pair.ensure_quotable()?;

        let symbol = Self::venue_symbol(pair);
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
        debug!(exchange = %self.id, symbol = %symbol, "fetching ticker");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            let body = response.text().await?;
            return Err(match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) if err.code == INVALID_SYMBOL => ExchangeError::UnsupportedPair(pair.to_string()),
                Ok(err) => ExchangeError::Api {
                    status: status.as_u16(),
                    body: err.msg,
                },
                Err(_) => ExchangeError::Api {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let ticker: TickerPriceResponse = read_json(response).await?;
        debug!(exchange = %self.id, symbol = %ticker.symbol, price = %ticker.price, "ticker received");

        Ok(Ticker {
            pair: pair.to_string(),
            last: parse_amount(&ticker.price),
        })
    }
}
