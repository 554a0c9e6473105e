#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
pub use twscreen::domain::ohlcv::OhlcvBar;
use twscreen::domain::error::ScreenerError;
use twscreen::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScreenerError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(ScreenerError::DataFetch {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(ticker).cloned().unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Consecutive calendar days from 2023-01-02.
pub fn day(i: usize) -> NaiveDate {
    date(2023, 1, 2) + chrono::Days::new(i as u64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: i64) -> OhlcvBar {
    OhlcvBar {
        date: day(i),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// `count` bars at `price` with a one-point range and 1000 shares.
pub fn flat_bars(count: usize, price: f64) -> Vec<OhlcvBar> {
    (0..count)
        .map(|i| make_bar(i, price, price + 1.0, price - 1.0, price, 1000))
        .collect()
}

/// 21 flat bars at 100 (high 101, low 99) then a breakout bar closing at 105
/// on 3x volume. A consolidation breakout fires on bar 21 with stop 99 and
/// target 108.
pub fn breakout_bars() -> Vec<OhlcvBar> {
    let mut bars = flat_bars(21, 100.0);
    bars.push(make_bar(21, 100.0, 106.0, 100.0, 105.0, 3000));
    bars
}

/// Deterministic pseudo-random walk for property-style tests.
pub fn walk_bars(count: usize, seed: u64) -> Vec<OhlcvBar> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as f64) / ((1u64 << 31) as f64)
    };
    let mut close = 100.0;
    (0..count)
        .map(|i| {
            let open = close;
            close = (close * (1.0 + (next() - 0.5) * 0.08)).max(1.0);
            let high = open.max(close) * (1.0 + next() * 0.02);
            let low = open.min(close) * (1.0 - next() * 0.02);
            let volume = 500 + (next() * 5000.0) as i64;
            make_bar(i, open, high, low, close, volume)
        })
        .collect()
}
