//! Registry of supported exchanges.
//!
//! Maps a closed set of [`ExchangeId`]s to constructor functions. Lookups for
//! identifiers outside the set fail with [`ConnectError::Unsupported`] rather
//! than resolving anything dynamically.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{BinanceClient, CoinbaseClient, ExchangeClient, ExchangeError, ExchangeId, KrakenClient};
use crate::credentials::{CredentialSource, ExchangeCredentials, StaticCredentials};

/// Everything a constructor needs to build one client.
#[derive(Clone)]
pub struct ConnectSettings {
    pub id: ExchangeId,
    pub credentials: Option<ExchangeCredentials>,
    /// Overrides the venue's production API root (used for mock servers).
    pub base_url: Option<String>,
    pub http: reqwest::Client,
}

type Constructor =
    Arc<dyn Fn(ConnectSettings) -> Result<Arc<dyn ExchangeClient>, ExchangeError> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("exchange {0} is not supported")]
    Unsupported(ExchangeId),
    #[error("failed to construct client for {exchange}: {source}")]
    Construction {
        exchange: ExchangeId,
        #[source]
        source: ExchangeError,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("unknown exchange {0:?} (supported: {1})")]
pub struct UnknownExchange(pub String, pub String);

/// Builds exchange clients by identifier.
pub trait ExchangeFactory: Send + Sync {
    fn supported(&self) -> Vec<ExchangeId>;

    fn is_supported(&self, id: &ExchangeId) -> bool {
        self.supported().contains(id)
    }

    fn connect(&self, id: &ExchangeId) -> Result<Arc<dyn ExchangeClient>, ConnectError>;
}

pub struct ExchangeRegistry {
    constructors: BTreeMap<ExchangeId, Constructor>,
    base_urls: HashMap<ExchangeId, String>,
    credentials: Arc<dyn CredentialSource>,
    http: reqwest::Client,
}

impl ExchangeRegistry {
    /// An empty registry with no credentials.
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
            base_urls: HashMap::new(),
            credentials: Arc::new(StaticCredentials::new()),
            http: reqwest::Client::new(),
        }
    }

    /// The exchanges this crate ships clients for.
    pub fn builtin() -> Self {
        Self::new()
            .register("binance", |settings| {
                Ok(Arc::new(BinanceClient::from_settings(settings)) as Arc<dyn ExchangeClient>)
            })
            .register("kraken", |settings| {
                Ok(Arc::new(KrakenClient::from_settings(settings)) as Arc<dyn ExchangeClient>)
            })
            .register("coinbase", |settings| {
                Ok(Arc::new(CoinbaseClient::from_settings(settings)?) as Arc<dyn ExchangeClient>)
            })
    }

    pub fn register<F>(mut self, id: impl Into<ExchangeId>, constructor: F) -> Self
    where
        F: Fn(ConnectSettings) -> Result<Arc<dyn ExchangeClient>, ExchangeError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(id.into(), Arc::new(constructor));
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Point one exchange at a different API root.
    ///
    /// Fails for identifiers that are not registered, so configuration typos
    /// surface at startup.
    pub fn with_base_url(
        mut self,
        id: impl Into<ExchangeId>,
        base_url: impl Into<String>,
    ) -> Result<Self, UnknownExchange> {
        let id = id.into();
        if !self.constructors.contains_key(&id) {
            return Err(UnknownExchange(id.to_string(), self.supported_list()));
        }
        self.base_urls.insert(id, base_url.into());
        Ok(self)
    }

    fn supported_list(&self) -> String {
        self.constructors
            .keys()
            .map(ExchangeId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ExchangeFactory for ExchangeRegistry {
    fn supported(&self) -> Vec<ExchangeId> {
        self.constructors.keys().cloned().collect()
    }

    fn is_supported(&self, id: &ExchangeId) -> bool {
        self.constructors.contains_key(id)
    }

    fn connect(&self, id: &ExchangeId) -> Result<Arc<dyn ExchangeClient>, ConnectError> {
        let constructor = self
            .constructors
            .get(id)
            .ok_or_else(|| ConnectError::Unsupported(id.clone()))?;

        let settings = ConnectSettings {
            id: id.clone(),
            credentials: self.credentials.credentials_for(id),
            base_url: self.base_urls.get(id).cloned(),
            http: self.http.clone(),
        };

        constructor(settings).map_err(|source| ConnectError::Construction {
            exchange: id.clone(),
            source,
        })
    }
}
