//! Configuration validation.
//!
//! Checks every scan setting before any ticker is fetched.

use crate::domain::backtest::TRADING_DAYS_PER_MONTH;
use crate::domain::error::ScreenerError;
use crate::domain::strategy::{parse_strategies, Strategy, StrategyParams};
use crate::domain::universe::{parse_codes, UniverseSource};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    validate_universe(config)?;
    validate_risk(config)?;
    let trend_mas = parse_ma_list(config)?;
    validate_batching(config)?;
    validate_history(config)?;
    let strategies = parse_strategies(&config.get_string("scan", "strategies").unwrap_or_default())?;
    validate_lookback(config, &strategies, trend_mas)?;
    Ok(())
}

fn validate_universe(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    let source: UniverseSource = config
        .get_string("universe", "source")
        .unwrap_or_else(|| "manual".to_string())
        .parse()?;
    if source == UniverseSource::Manual {
        let tickers = config.get_string("universe", "tickers").unwrap_or_default();
        if tickers.trim().is_empty() {
            return Err(ScreenerError::ConfigMissing {
                section: "universe".to_string(),
                key: "tickers".to_string(),
            });
        }
        parse_codes(&tickers)
            .map_err(|e| ScreenerError::invalid("universe", "tickers", e.to_string()))?;
    }
    if config.get_int("universe", "limit", 0) < 0 {
        return Err(ScreenerError::invalid("universe", "limit", "limit must be non-negative"));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    let ratio = config.get_double("risk", "risk_reward_ratio", 1.5);
    if ratio <= 0.0 {
        return Err(ScreenerError::invalid(
            "risk",
            "risk_reward_ratio",
            "risk_reward_ratio must be positive",
        ));
    }
    let min_risk = config.get_double("risk", "min_risk_pct", 1.0);
    if min_risk <= 0.0 || min_risk > 10.0 {
        return Err(ScreenerError::invalid(
            "risk",
            "min_risk_pct",
            "min_risk_pct must be in (0, 10]",
        ));
    }
    if config.get_double("risk", "min_volume_lots", 0.0) < 0.0 {
        return Err(ScreenerError::invalid(
            "risk",
            "min_volume_lots",
            "min_volume_lots must be non-negative",
        ));
    }
    Ok(())
}

/// Parses `[risk] trend_mas` into moving-average windows.
pub fn parse_ma_list(config: &dyn ConfigPort) -> Result<Vec<usize>, ScreenerError> {
    config
        .get_list("risk", "trend_mas")
        .iter()
        .map(|item| match item.parse::<usize>() {
            Ok(0) | Err(_) => Err(ScreenerError::invalid(
                "risk",
                "trend_mas",
                format!("'{item}' is not a positive window"),
            )),
            Ok(n) => Ok(n),
        })
        .collect()
}

fn validate_batching(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    if config.get_int("scan", "batch_size", 20) < 1 {
        return Err(ScreenerError::invalid("scan", "batch_size", "batch_size must be at least 1"));
    }
    if config.get_int("scan", "fetch_concurrency", 4) < 1 {
        return Err(ScreenerError::invalid(
            "scan",
            "fetch_concurrency",
            "fetch_concurrency must be at least 1",
        ));
    }
    if config.get_int("scan", "throttle_ms", 300) < 0 {
        return Err(ScreenerError::invalid("scan", "throttle_ms", "throttle_ms must be non-negative"));
    }
    Ok(())
}

fn validate_history(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    if config.get_int("scan", "history_days", 400) < 1 {
        return Err(ScreenerError::invalid("scan", "history_days", "history_days must be at least 1"));
    }
    if let Some(as_of) = config.get_string("scan", "as_of") {
        parse_as_of(&as_of)?;
    }
    Ok(())
}

pub fn parse_as_of(value: &str) -> Result<NaiveDate, ScreenerError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ScreenerError::invalid("scan", "as_of", "invalid as_of format, expected YYYY-MM-DD")
    })
}

fn validate_lookback(
    config: &dyn ConfigPort,
    strategies: &[Strategy],
    trend_mas: Vec<usize>,
) -> Result<(), ScreenerError> {
    let months = config.get_int("scan", "lookback_months", 6);
    if months < 1 {
        return Err(ScreenerError::invalid(
            "scan",
            "lookback_months",
            "lookback_months must be at least 1",
        ));
    }
    if !config.get_bool("scan", "backtest", true) {
        return Ok(());
    }
    let mut params = StrategyParams::default();
    params.gate.trend_mas = trend_mas;
    let needed = strategies
        .iter()
        .map(|s| s.min_bars(&params))
        .max()
        .unwrap_or(0);
    let bars = months as usize * TRADING_DAYS_PER_MONTH;
    if bars < needed {
        return Err(ScreenerError::invalid(
            "scan",
            "lookback_months",
            format!("{months} months ({bars} bars) is shorter than the {needed} bars required"),
        ));
    }
    Ok(())
}
