//! Kraken spot REST client.
//!
//! Private calls are form-encoded POSTs signed with
//! `HMAC-SHA512(base64_decode(secret), path || SHA256(nonce || body))`.
//! Kraken reports errors inside a 200 response's `error` array.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};

use super::{
    merge_balances, parse_amount, read_json, BalanceEntry, ConnectSettings, ExchangeClient,
    ExchangeError, ExchangeId, Ticker, TradingPair,
};
use crate::credentials::ExchangeCredentials;

type HmacSha512 = Hmac<Sha512>;

const KRAKEN_API_BASE: &str = "https://api.kraken.com";
const BALANCE_PATH: &str = "/0/private/Balance";
const TICKER_PATH: &str = "/0/public/Ticker";

/// Pre-2019 asset codes carry an `X` (crypto) or `Z` (fiat) prefix.
const LEGACY_PREFIXED: &[&str] = &[
    "XXBT", "XETH", "XETC", "XLTC", "XMLN", "XREP", "XXDG", "XXLM", "XXMR", "XXRP", "XZEC",
    "ZUSD", "ZEUR", "ZGBP", "ZCAD", "ZJPY", "ZAUD", "ZCHF",
];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TickerInfo {
    /// Last trade closed: `[price, lot volume]`.
    c: Vec<String>,
}

pub struct KrakenClient {
    id: ExchangeId,
    client: reqwest::Client,
    base_url: String,
    credentials: Option<ExchangeCredentials>,
    last_nonce: AtomicU64,
}

impl KrakenClient {
    pub fn new(credentials: Option<ExchangeCredentials>) -> Self {
        Self {
            id: ExchangeId::new("kraken"),
            client: reqwest::Client::new(),
            base_url: KRAKEN_API_BASE.to_string(),
            credentials,
            last_nonce: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: ConnectSettings) -> Self {
        let mut client = Self::new(settings.credentials);
        client.id = settings.id;
        client.client = settings.http;
        if let Some(base_url) = settings.base_url {
            client = client.with_base_url(base_url);
        }
        client
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Strictly increasing millisecond nonce.
    fn next_nonce(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last_nonce.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self
                .last_nonce
                .compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    fn sign(secret_b64: &str, path: &str, nonce: &str, body: &str) -> Result<String, ExchangeError> {
        let secret = STANDARD
            .decode(secret_b64.trim())
            .map_err(|e| ExchangeError::Signing(format!("API secret is not base64: {e}")))?;

        let mut inner = Sha256::new();
        inner.update(nonce.as_bytes());
        inner.update(body.as_bytes());

        let mut mac = HmacSha512::new_from_slice(&secret)
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(path.as_bytes());
        mac.update(&inner.finalize());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn private<T: DeserializeOwned>(&self, path: &str) -> Result<T, ExchangeError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ExchangeError::MissingCredentials(self.id.clone()))?;

        let nonce = self.next_nonce().to_string();
        let body = format!("nonce={nonce}");
        let signature = Self::sign(credentials.api_secret.expose_secret(), path, &nonce, &body)?;

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("API-Key", &credentials.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let envelope: Envelope<T> = read_json(response).await?;
        Self::unwrap_envelope(envelope, None)
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>, pair: Option<&TradingPair>) -> Result<T, ExchangeError> {
        if let Some(first) = envelope.error.first() {
            return Err(classify_error(first, pair));
        }
        envelope
            .result
            .ok_or_else(|| ExchangeError::Decode("response has neither error nor result".to_string()))
    }
}

fn classify_error(message: &str, pair: Option<&TradingPair>) -> ExchangeError {
    if message.contains("Unknown asset pair") {
        let pair = pair.map(ToString::to_string).unwrap_or_default();
        return ExchangeError::UnsupportedPair(pair);
    }
    if message.contains("Rate limit") || message.contains("Too many requests") {
        return ExchangeError::RateLimited;
    }
    if message.starts_with("EAPI:Invalid")
        || message.contains("Permission denied")
        || message.contains("Invalid nonce")
    {
        return ExchangeError::Auth(message.to_string());
    }
    ExchangeError::Api {
        status: 200,
        body: message.to_string(),
    }
}

/// Kraken asset code -> common ticker symbol (`XXBT` -> `BTC`, `ZUSD` -> `USD`).
pub fn normalize_asset(code: &str) -> String {
    let stripped = if LEGACY_PREFIXED.contains(&code) {
        &code[1..]
    } else {
        code
    };
    match stripped {
        "XBT" => "BTC".to_string(),
        "XDG" => "DOGE".to_string(),
        other => other.to_string(),
    }
}

/// Common symbol -> Kraken's name for it in pair strings.
fn venue_asset(symbol: &str) -> &str {
    match symbol {
        "BTC" => "XBT",
        "DOGE" => "XDG",
        other => other,
    }
}

#[async_trait::async_trait]
impl ExchangeClient for KrakenClient {
    fn id(&self) -> &ExchangeId {
        &self.id
    }

    async fn fetch_balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError> {
        let balances: serde_json::Map<String, serde_json::Value> =
            self.private(BALANCE_PATH).await?;

        Ok(merge_balances(balances.into_iter().map(|(code, value)| {
            let amount = match &value {
                serde_json::Value::String(s) => parse_amount(s),
                serde_json::Value::Number(n) => n.as_f64(),
                _ => None,
            };
            BalanceEntry::new(normalize_asset(&code), amount)
        })))
    }

    async fn fetch_ticker(&self, pair: &TradingPair) -> Result<Ticker, ExchangeError> {
        pair.ensure_quotable()?;

        let venue_pair = format!("{}{}", venue_asset(&pair.base), venue_asset(&pair.quote));
        let url = format!("{}{}?pair={}", self.base_url, TICKER_PATH, venue_pair);

        let response = self.client.get(&url).send().await?;
        let envelope: Envelope<serde_json::Map<String, serde_json::Value>> =
            read_json(response).await?;
        let result = Self::unwrap_envelope(envelope, Some(pair))?;

        // The result is keyed by Kraken's canonical pair name, which may differ
        // from the one requested.
        let (_, info) = result
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::UnsupportedPair(pair.to_string()))?;
        let info: TickerInfo =
            serde_json::from_value(info).map_err(|e| ExchangeError::Decode(e.to_string()))?;

        Ok(Ticker {
            pair: pair.to_string(),
            last: info.c.first().and_then(|p| parse_amount(p)),
        })
    }
}
