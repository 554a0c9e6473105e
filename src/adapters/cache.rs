//! Time-boxed caching decorators for the data and universe providers.
//!
//! Entries expire `ttl` after they were stored. A zero `ttl` disables
//! caching. Errors are never cached. Each cache is owned by whoever builds
//! it; nothing is shared process-wide.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::Ticker;
use crate::ports::data_port::DataPort;
use crate::ports::universe_port::UniversePort;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

type BarKey = (String, NaiveDate, NaiveDate);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct CachedDataPort<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<BarKey, (Instant, Vec<OhlcvBar>)>>,
}

impl<P: DataPort> CachedDataPort<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries and returns how many were removed. Entries are
    /// otherwise only replaced when the same key is fetched again.
    pub fn purge(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        before - entries.len()
    }
}

impl<P: DataPort> DataPort for CachedDataPort<P> {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScreenerError> {
        if self.ttl.is_zero() {
            return self.inner.fetch_ohlcv(ticker, start_date, end_date);
        }

        let key = (ticker.to_string(), start_date, end_date);
        if let Some((stored, bars)) = lock(&self.entries).get(&key) {
            if stored.elapsed() < self.ttl {
                debug!(ticker, "bar cache hit");
                return Ok(bars.clone());
            }
        }

        // The lock is not held across the provider call.
        let bars = self.inner.fetch_ohlcv(ticker, start_date, end_date)?;
        lock(&self.entries).insert(key, (Instant::now(), bars.clone()));
        Ok(bars)
    }
}

pub struct CachedUniverse<U> {
    inner: U,
    ttl: Duration,
    entry: Mutex<Option<(Instant, Vec<Ticker>)>>,
}

impl<U: UniversePort> CachedUniverse<U> {
    pub fn new(inner: U, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entry: Mutex::new(None),
        }
    }
}

impl<U: UniversePort> UniversePort for CachedUniverse<U> {
    fn list_tickers(&self) -> Result<Vec<Ticker>, ScreenerError> {
        if self.ttl.is_zero() {
            return self.inner.list_tickers();
        }

        if let Some((stored, tickers)) = lock(&self.entry).as_ref() {
            if stored.elapsed() < self.ttl {
                debug!(tickers = tickers.len(), "universe cache hit");
                return Ok(tickers.clone());
            }
        }

        let tickers = self.inner.list_tickers()?;
        *lock(&self.entry) = Some((Instant::now(), tickers.clone()));
        Ok(tickers)
    }
}
