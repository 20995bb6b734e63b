//! Shared USD price cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How cached prices go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheExpiry {
    /// One timestamp for the whole cache; once it is older than the TTL every
    /// entry is dropped together.
    #[default]
    Epoch,
    /// Each entry carries its own write time and expires on its own.
    PerEntry,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    price: f64,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    prices: HashMap<String, Entry>,
    last_refreshed: Option<DateTime<Utc>>,
    /// Latest time passed to `maybe_reset`.
    now: Option<DateTime<Utc>>,
    epoch: u64,
}

/// Upper-case symbol -> last resolved USD price.
///
/// Every resolution calls [`PriceCache::maybe_reset`] first. In
/// [`CacheExpiry::Epoch`] mode that clears the whole mapping once
/// `now - last_refreshed > ttl`; a cache that has never been reset always
/// resets on first use. The returned epoch number increases on every reset so
/// dependent state (the symbol listing) can follow the cache's lifetime.
#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    expiry: CacheExpiry,
    state: Mutex<State>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            expiry: CacheExpiry::Epoch,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_expiry(mut self, expiry: CacheExpiry) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expiry(&self) -> CacheExpiry {
        self.expiry
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_stale(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - since).to_std() {
            Ok(elapsed) => elapsed > self.ttl,
            // `now` is before `since`: the clock went backwards.
            Err(_) => false,
        }
    }

    /// Start a resolution at `now`, expiring stale prices. Returns the
    /// current epoch.
    pub fn maybe_reset(&self, now: DateTime<Utc>) -> u64 {
        let mut state = self.state();
        state.now = Some(now);

        let expired = match state.last_refreshed {
            None => true,
            Some(last) => self.is_stale(last, now),
        };
        if !expired {
            return state.epoch;
        }

        let before = state.prices.len();
        match self.expiry {
            CacheExpiry::Epoch => state.prices.clear(),
            CacheExpiry::PerEntry => state
                .prices
                .retain(|_, entry| !self.is_stale(entry.stored_at, now)),
        }
        state.last_refreshed = Some(now);
        state.epoch += 1;

        debug!(
            epoch = state.epoch,
            dropped = before - state.prices.len(),
            "price cache reset"
        );
        state.epoch
    }

    pub fn lookup(&self, symbol: &str) -> Option<f64> {
        let state = self.state();
        let entry = state.prices.get(&symbol.trim().to_uppercase())?;
        if self.expiry == CacheExpiry::PerEntry {
            if let Some(now) = state.now {
                if self.is_stale(entry.stored_at, now) {
                    return None;
                }
            }
        }
        Some(entry.price)
    }

    pub fn store(&self, symbol: &str, price: f64) {
        let mut state = self.state();
        let stored_at = state.now.unwrap_or_else(Utc::now);
        state
            .prices
            .insert(symbol.trim().to_uppercase(), Entry { price, stored_at });
    }

    /// When the cache was last reset, `None` before the first resolution.
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.state().last_refreshed
    }

    pub fn len(&self) -> usize {
        self.state().prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and force a reset on the next resolution.
    pub fn clear(&self) {
        let mut state = self.state();
        state.prices.clear();
        state.last_refreshed = None;
    }
}
