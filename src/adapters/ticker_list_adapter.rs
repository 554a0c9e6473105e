//! Exchange listing file adapter.
//!
//! Reads a `code,name` CSV (one row per listed instrument, header required)
//! and keeps ordinary shares only.

use crate::domain::error::ScreenerError;
use crate::domain::universe::{listing_to_tickers, Ticker};
use crate::ports::universe_port::UniversePort;
use std::path::PathBuf;

pub struct TickerListAdapter {
    path: PathBuf,
    suffix: String,
}

impl TickerListAdapter {
    pub fn new(path: PathBuf, suffix: impl Into<String>) -> Self {
        Self {
            path,
            suffix: suffix.into(),
        }
    }
}

impl UniversePort for TickerListAdapter {
    fn list_tickers(&self) -> Result<Vec<Ticker>, ScreenerError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| ScreenerError::Universe {
                reason: format!("failed to open listing {}: {}", self.path.display(), e),
            })?;

        let mut rows: Vec<(String, Option<String>)> = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| ScreenerError::Universe {
                reason: format!("listing parse error: {e}"),
            })?;
            if let Some(code) = record.get(0) {
                rows.push((code.to_string(), record.get(1).map(str::to_string)));
            }
        }

        let tickers = listing_to_tickers(
            rows.iter().map(|(code, name)| (code.as_str(), name.as_deref())),
            &self.suffix,
        );
        if tickers.is_empty() {
            return Err(ScreenerError::Universe {
                reason: format!("no listed shares in {}", self.path.display()),
            });
        }
        Ok(tickers)
    }
}
