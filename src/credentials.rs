//! Exchange API credentials.
//!
//! Credentials are only read, never managed: by default they come from
//! `{EXCHANGE}_API_KEY` / `{EXCHANGE}_API_SECRET` environment variables.
//! A missing pair just means the client is built unauthenticated.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::exchange::ExchangeId;

/// API key plus secret for one exchange account.
///
/// For Coinbase the key is the CDP key name and the secret is the EC private
/// key in SEC1 PEM form.
#[derive(Debug)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

impl Clone for ExchangeCredentials {
    fn clone(&self) -> Self {
        Self {
            api_key: self.api_key.clone(),
            api_secret: SecretString::new(self.api_secret.expose_secret().into()),
        }
    }
}

impl ExchangeCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::new(api_secret.into().into_boxed_str()),
        }
    }
}

pub trait CredentialSource: Send + Sync {
    fn credentials_for(&self, exchange: &ExchangeId) -> Option<ExchangeCredentials>;
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads credentials from environment variables.
#[derive(Clone)]
pub struct EnvCredentials {
    lookup: EnvLookup,
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self {
            lookup: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Use a custom variable lookup instead of the process environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for EnvCredentials {
    fn credentials_for(&self, exchange: &ExchangeId) -> Option<ExchangeCredentials> {
        let prefix = exchange.env_prefix();
        let api_key = self.var(&format!("{prefix}_API_KEY"))?;
        let api_secret = self.var(&format!("{prefix}_API_SECRET"))?;
        Some(ExchangeCredentials::new(api_key, api_secret))
    }
}

/// Fixed set of credentials, keyed by exchange.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<ExchangeId, ExchangeCredentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, exchange: impl Into<ExchangeId>, credentials: ExchangeCredentials) -> Self {
        self.entries.insert(exchange.into(), credentials);
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn credentials_for(&self, exchange: &ExchangeId) -> Option<ExchangeCredentials> {
        self.entries.get(exchange).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> EnvCredentials {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvCredentials::with_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn env_credentials_require_key_and_secret() {
        let source = env(&[("BINANCE_API_KEY", "k"), ("BINANCE_API_SECRET", "s"), ("KRAKEN_API_KEY", "k2")]);

        let binance = source
            .credentials_for(&ExchangeId::new("binance"))
            .expect("binance credentials");
        assert_eq!(binance.api_key, "k");
        assert_eq!(binance.api_secret.expose_secret(), "s");

        assert!(source.credentials_for(&ExchangeId::new("kraken")).is_none());
        assert!(source.credentials_for(&ExchangeId::new("coinbase")).is_none());
    }

    #[test]
    fn env_credentials_ignore_blank_values() {
        let source = env(&[("BINANCE_API_KEY", "k"), ("BINANCE_API_SECRET", "  ")]);
        assert!(source.credentials_for(&ExchangeId::new("binance")).is_none());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let creds = ExchangeCredentials::new("key", "super-secret");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn static_credentials_lookup() {
        let source = StaticCredentials::new().with("Kraken", ExchangeCredentials::new("a", "b"));
        assert!(source.credentials_for(&ExchangeId::new("kraken")).is_some());
        assert!(source.credentials_for(&ExchangeId::new("binance")).is_none());
    }
}
