//! Caller-owned memory of matches already reported.
//!
//! Repeated scans during a trading day keep surfacing the same matches. A
//! `ScanSession` remembers each `(ticker, strategy, bar date)` it has seen so
//! the caller can highlight only what is new. Its lifetime is whatever the
//! caller decides; the pipeline never keeps one on its own.

use crate::domain::scan::ScanResult;
use chrono::NaiveDate;
use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct ScanSession {
    seen: HashSet<(String, &'static str, NaiveDate)>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `is_new` on each result and records it as seen.
    pub fn mark(&mut self, results: &mut [ScanResult]) {
        for result in results {
            let key = (
                result.ticker.clone(),
                result.strategy,
                result.signal.date,
            );
            result.is_new = self.seen.insert(key);
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
