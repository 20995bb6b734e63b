use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{
    deserialize_duration, deserialize_duration_opt, serialize_duration, serialize_duration_opt,
};
use crate::pricing::CacheExpiry;

/// Environment variable overriding `cache.ttl`, in whole seconds.
pub const CACHE_TTL_ENV: &str = "PORTFOLIO_CACHE_TTL";

const CONFIG_FILE_NAME: &str = "coinbook.toml";

fn default_cache_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_concurrency() -> usize {
    1
}

/// Price cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long resolved prices are reused.
    #[serde(
        default = "default_cache_ttl",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub ttl: Duration,

    pub expiry: CacheExpiry,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            expiry: CacheExpiry::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Exchanges queried at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Budget for a whole valuation request.
    #[serde(
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_timeout: Option<Duration>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout for every outbound HTTP call.
    #[serde(
        default = "default_http_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// Override the CoinGecko API root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// CoinGecko demo API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Symbol -> CoinGecko id, used instead of the coin listing.
    pub symbol_overrides: HashMap<String, String>,
}

/// Per-exchange settings under `[exchanges.<id>]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Display/output formatting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Decimal places for USD values in human output. Prices are never
    /// rounded.
    pub currency_decimals: Option<u32>,

    /// Render values with thousands separators.
    pub currency_grouping: bool,

    pub currency_symbol: Option<String>,

    /// Pad values to exactly `currency_decimals` places.
    pub currency_fixed_decimals: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_decimals: Some(2),
            currency_grouping: true,
            currency_symbol: Some("$".to_string()),
            currency_fixed_decimals: true,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub aggregator: AggregatorConfig,
    pub http: HttpConfig,
    pub market_data: MarketDataConfig,
    pub exchanges: BTreeMap<String, ExchangeConfig>,
    pub display: DisplayConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `PORTFOLIO_CACHE_TTL` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(CACHE_TTL_ENV).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{CACHE_TTL_ENV} must be whole seconds, got {raw:?}"))?;
            self.cache.ttl = Duration::from_secs(secs);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.aggregator.concurrency == 0 {
            anyhow::bail!("aggregator.concurrency must be at least 1");
        }
        if self.http.timeout.is_zero() {
            anyhow::bail!("http.timeout must be greater than zero");
        }
        Ok(())
    }

    /// Copy safe to print: API keys are masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.market_data.api_key.is_some() {
            config.market_data.api_key = Some("***".to_string());
        }
        config
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./coinbook.toml` if it exists in current directory
/// 2. `<config dir>/coinbook/coinbook.toml` (e.g. `~/.config` on Linux)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return local_config;
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("coinbook").join(CONFIG_FILE_NAME);
    }

    local_config
}
