//! Screening pipeline.
//!
//! Tickers are processed in batches. For each batch:
//! 1. the stop flag is checked, and the pipeline sleeps `throttle` after the first batch
//! 2. bars are fetched on a small private pool (`fetch_concurrency` requests in flight)
//! 3. indicators, live signals and backtests run on a compute pool
//! 4. per-ticker outcomes are merged into the report on the calling thread
//!
//! A fetch error or an empty/short series only affects its own ticker.

use crate::domain::backtest::{run_backtest, BacktestConfig};
use crate::domain::code_data::CodeData;
use crate::domain::error::ScreenerError;
use crate::domain::indicator::IndicatorType;
use crate::domain::metrics::BacktestSummary;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::{Signal, Strategy, StrategyParams};
use crate::domain::universe::Ticker;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub strategies: Vec<Strategy>,
    pub params: StrategyParams,
    /// `None` disables backtesting.
    pub backtest: Option<BacktestConfig>,
    pub batch_size: usize,
    pub throttle: Duration,
    pub fetch_concurrency: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ScanConfig {
    /// Longest history any selected strategy needs.
    pub fn max_min_bars(&self) -> usize {
        self.strategies
            .iter()
            .map(|s| s.min_bars(&self.params))
            .max()
            .unwrap_or(0)
    }

    /// Union of indicator requests across the selected strategies.
    pub fn indicator_requests(&self) -> Vec<IndicatorType> {
        let mut requests: Vec<IndicatorType> = self
            .strategies
            .iter()
            .flat_map(|s| s.required_indicators(&self.params))
            .collect();
        requests.sort();
        requests.dedup();
        requests
    }

    pub fn validate(&self) -> Result<(), ScreenerError> {
        if self.strategies.is_empty() {
            return Err(ScreenerError::invalid("scan", "strategies", "no strategy selected"));
        }
        let risk = &self.params.risk;
        if !(risk.risk_reward_ratio > 0.0) {
            return Err(ScreenerError::invalid(
                "risk",
                "risk_reward_ratio",
                "risk_reward_ratio must be positive",
            ));
        }
        if !(risk.min_risk_fraction > 0.0 && risk.min_risk_fraction <= 0.1) {
            return Err(ScreenerError::invalid(
                "risk",
                "min_risk_pct",
                "min_risk_pct must be in (0, 10]",
            ));
        }
        if self.params.gate.min_volume_lots < 0.0 {
            return Err(ScreenerError::invalid(
                "risk",
                "min_volume_lots",
                "min_volume_lots must be non-negative",
            ));
        }
        if self.params.gate.trend_mas.contains(&0) {
            return Err(ScreenerError::invalid(
                "risk",
                "trend_mas",
                "moving-average windows must be at least 1",
            ));
        }
        if self.batch_size == 0 {
            return Err(ScreenerError::invalid("scan", "batch_size", "batch_size must be at least 1"));
        }
        if self.fetch_concurrency == 0 {
            return Err(ScreenerError::invalid(
                "scan",
                "fetch_concurrency",
                "fetch_concurrency must be at least 1",
            ));
        }
        if self.start_date >= self.end_date {
            return Err(ScreenerError::invalid(
                "scan",
                "history_days",
                "history start must be before the as-of date",
            ));
        }
        if let Some(backtest) = &self.backtest {
            let needed = self.max_min_bars();
            if backtest.lookback_bars < needed {
                return Err(ScreenerError::invalid(
                    "scan",
                    "lookback_months",
                    format!(
                        "lookback of {} bars is shorter than the {} bars the selected strategies need",
                        backtest.lookback_bars, needed
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// One live match, with its optional backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub ticker: String,
    pub name: Option<String>,
    pub strategy: &'static str,
    pub signal: Signal,
    pub backtest: Option<BacktestSummary>,
    /// Set by [`crate::domain::session::ScanSession::mark`].
    pub is_new: bool,
}

/// Flat export row for one (ticker, strategy) match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRecord {
    pub ticker: String,
    pub name: String,
    pub strategy: String,
    pub label: String,
    pub date: String,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub details: String,
    pub trade_count: Option<usize>,
    pub win_rate: Option<f64>,
    pub avg_return: Option<f64>,
    pub is_new: bool,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl From<&ScanResult> for ScanRecord {
    fn from(r: &ScanResult) -> Self {
        let details = r
            .signal
            .extras
            .iter()
            .map(|(k, v)| format!("{k}={v:.2}"))
            .collect::<Vec<_>>()
            .join("; ");
        let (trade_count, win_rate, avg_return) = match &r.backtest {
            None => (None, None, None),
            Some(BacktestSummary::NoSignals) => (Some(0), None, None),
            Some(BacktestSummary::Trades(s)) => (
                Some(s.trade_count),
                Some(round2(s.win_rate)),
                Some(round2(s.avg_return)),
            ),
        };
        ScanRecord {
            ticker: r.ticker.clone(),
            name: r.name.clone().unwrap_or_default(),
            strategy: r.strategy.to_string(),
            label: r.signal.label.to_string(),
            date: r.signal.date.format("%Y-%m-%d").to_string(),
            entry: round2(r.signal.entry_price),
            stop: round2(r.signal.stop_price),
            target: round2(r.signal.target_price),
            details,
            trade_count,
            win_rate,
            avg_return,
            is_new: r.is_new,
        }
    }
}

/// A ticker skipped because its data could not be fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFailure {
    pub ticker: String,
    pub reason: String,
}

/// A ticker whose history was too short for every selected strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct InsufficientTicker {
    pub ticker: String,
    pub bars: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub results: Vec<ScanResult>,
    pub failures: Vec<ScanFailure>,
    pub insufficient: Vec<InsufficientTicker>,
    pub scanned: usize,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn for_strategy<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ScanResult> + 'a {
        self.results.iter().filter(move |r| r.strategy == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub batch: usize,
    pub batches: usize,
    pub tickers_done: usize,
    pub tickers_total: usize,
}

enum TickerOutcome {
    Evaluated(Vec<ScanResult>),
    Insufficient { bars: usize },
}

/// Runs every selected strategy over every ticker.
///
/// Only configuration problems are returned as errors, and they are reported
/// before any fetch. `cancel` is honoured between batches; `progress` runs
/// after each completed batch.
pub fn run_scan<F>(
    data_port: &dyn DataPort,
    tickers: &[Ticker],
    config: &ScanConfig,
    cancel: &AtomicBool,
    progress: F,
) -> Result<ScanReport, ScreenerError>
where
    F: Fn(&ScanProgress),
{
    config.validate()?;

    let fetch_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.fetch_concurrency)
        .build()?;
    let compute_pool = rayon::ThreadPoolBuilder::new().build()?;

    let requests = config.indicator_requests();
    let batches = tickers.len().div_ceil(config.batch_size);
    let mut report = ScanReport::default();

    info!(
        tickers = tickers.len(),
        strategies = config.strategies.len(),
        batches,
        backtest = config.backtest.is_some(),
        "starting scan"
    );

    for (batch_no, batch) in tickers.chunks(config.batch_size).enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!(batch = batch_no, "scan stopped");
            report.cancelled = true;
            break;
        }
        if batch_no > 0 && !config.throttle.is_zero() {
            std::thread::sleep(config.throttle);
        }

        let symbols: Vec<String> = batch.iter().map(|t| t.symbol.clone()).collect();
        let chunk_len = symbols.len().div_ceil(config.fetch_concurrency).max(1);
        let fetched: Vec<Result<Vec<OhlcvBar>, ScreenerError>> = fetch_pool.install(|| {
            symbols
                .par_chunks(chunk_len)
                .flat_map_iter(|chunk| fetch_chunk(data_port, chunk, config))
                .collect()
        });

        let outcomes: Vec<Result<TickerOutcome, ScreenerError>> = compute_pool.install(|| {
            batch
                .par_iter()
                .zip(fetched.into_par_iter())
                .map(|(ticker, bars)| bars.map(|b| evaluate_ticker(ticker, b, &requests, config)))
                .collect()
        });

        for (ticker, outcome) in batch.iter().zip(outcomes) {
            report.scanned += 1;
            match outcome {
                Ok(TickerOutcome::Evaluated(results)) => {
                    debug!(ticker = %ticker.symbol, matches = results.len(), "evaluated");
                    report.results.extend(results);
                }
                Ok(TickerOutcome::Insufficient { bars }) => {
                    debug!(ticker = %ticker.symbol, bars, "insufficient data");
                    report.insufficient.push(InsufficientTicker {
                        ticker: ticker.symbol.clone(),
                        bars,
                    });
                }
                Err(e) => {
                    warn!(ticker = %ticker.symbol, error = %e, "skipping ticker");
                    report.failures.push(ScanFailure {
                        ticker: ticker.symbol.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        progress(&ScanProgress {
            batch: batch_no + 1,
            batches,
            tickers_done: report.scanned,
            tickers_total: tickers.len(),
        });
    }

    rank_results(&mut report.results, &config.strategies);

    info!(
        scanned = report.scanned,
        matches = report.results.len(),
        failures = report.failures.len(),
        insufficient = report.insufficient.len(),
        "scan finished"
    );
    Ok(report)
}

/// Orders matches by strategy selection, then best backtest first (win rate,
/// then average return). Matches without backtest trades follow. Ties keep
/// universe order.
pub fn rank_results(results: &mut [ScanResult], strategies: &[Strategy]) {
    let position = |name: &str| {
        strategies
            .iter()
            .position(|s| s.name() == name)
            .unwrap_or(usize::MAX)
    };
    let track_record = |r: &ScanResult| match &r.backtest {
        Some(BacktestSummary::Trades(s)) => Some((s.win_rate, s.avg_return)),
        _ => None,
    };
    results.sort_by(|a, b| {
        position(a.strategy)
            .cmp(&position(b.strategy))
            .then_with(|| match (track_record(a), track_record(b)) {
                (Some((wa, ra)), Some((wb, rb))) => wb.total_cmp(&wa).then(rb.total_cmp(&ra)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });
}

/// Fetches one provider request worth of tickers. A provider answering with
/// the wrong number of series fails the whole chunk.
fn fetch_chunk(
    data_port: &dyn DataPort,
    chunk: &[String],
    config: &ScanConfig,
) -> Vec<Result<Vec<OhlcvBar>, ScreenerError>> {
    let results = data_port.fetch_batch(chunk, config.start_date, config.end_date);
    if results.len() == chunk.len() {
        return results;
    }
    chunk
        .iter()
        .map(|t| {
            Err(ScreenerError::DataFetch {
                ticker: t.clone(),
                reason: format!(
                    "provider returned {} series for {} tickers",
                    results.len(),
                    chunk.len()
                ),
            })
        })
        .collect()
}

fn evaluate_ticker(
    ticker: &Ticker,
    bars: Vec<OhlcvBar>,
    requests: &[IndicatorType],
    config: &ScanConfig,
) -> TickerOutcome {
    let shortest = config
        .strategies
        .iter()
        .map(|s| s.min_bars(&config.params))
        .min()
        .unwrap_or(0);
    if bars.is_empty() || bars.len() < shortest {
        return TickerOutcome::Insufficient { bars: bars.len() };
    }

    let data = CodeData::with_indicators(ticker.symbol.clone(), bars, requests);
    let results = config
        .strategies
        .iter()
        .filter_map(|strategy| {
            let signal = strategy.evaluate_live(&data, &config.params)?;
            let backtest = config
                .backtest
                .as_ref()
                .map(|bt| run_backtest(strategy, &data, &config.params, bt).summary);
            Some(ScanResult {
                ticker: ticker.symbol.clone(),
                name: ticker.name.clone(),
                strategy: strategy.name(),
                signal,
                backtest,
                is_new: false,
            })
        })
        .collect();

    TickerOutcome::Evaluated(results)
}
