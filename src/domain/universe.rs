//! Ticker universe resolution.
//!
//! A scan runs either over a manual comma-separated list or over the full
//! market listing supplied by a [`UniversePort`].

use crate::domain::error::ScreenerError;
use crate::ports::universe_port::UniversePort;
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    pub symbol: String,
    pub name: Option<String>,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniverseSource {
    Manual,
    FullMarket,
}

impl FromStr for UniverseSource {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(UniverseSource::Manual),
            "full" | "full-market" => Ok(UniverseSource::FullMarket),
            other => Err(ScreenerError::invalid(
                "universe",
                "source",
                format!("unknown source '{other}', expected manual or full"),
            )),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateCode(String),
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Keeps ordinary four-digit share codes from an exchange listing and
/// appends the market suffix. Warrants, ETFs with letter codes and other
/// instruments are dropped. Output is de-duplicated and sorted.
pub fn listing_to_tickers<'a>(
    entries: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
    suffix: &str,
) -> Vec<Ticker> {
    let mut seen = HashSet::new();
    let mut tickers: Vec<Ticker> = entries
        .into_iter()
        .filter_map(|(code, name)| {
            let code = code.trim();
            let is_share = code.len() == 4 && code.chars().all(|c| c.is_ascii_digit());
            if !is_share {
                return None;
            }
            let symbol = format!("{code}{suffix}");
            seen.insert(symbol.clone()).then(|| Ticker {
                symbol,
                name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            })
        })
        .collect();
    tickers.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    tickers
}

/// Resolves the tickers to scan. `limit` caps a full-market universe; 0 means
/// no cap.
pub fn resolve_universe(
    source: UniverseSource,
    manual: &str,
    provider: &dyn UniversePort,
    limit: usize,
) -> Result<Vec<Ticker>, ScreenerError> {
    match source {
        UniverseSource::Manual => {
            let codes = parse_codes(manual).map_err(|e| ScreenerError::Universe {
                reason: e.to_string(),
            })?;
            Ok(codes.into_iter().map(Ticker::new).collect())
        }
        UniverseSource::FullMarket => {
            let mut tickers = provider.list_tickers()?;
            if limit > 0 {
                tickers.truncate(limit);
            }
            Ok(tickers)
        }
    }
}
