//! Strategy catalog: one rule per detector, evaluated at any bar index.
//!
//! Every detector is written once as `evaluate_at(data, i, params)`. The live
//! scan calls it with the last bar index; the backtest replays it over history.
//! A detector only reads bars `0..=i` and indicator points at `i` or `i - 1`.
//! Insufficient history, a warming-up indicator or a failed gate all read as
//! no-match.

pub mod gate;
pub mod levels;

use crate::domain::code_data::CodeData;
use crate::domain::error::ScreenerError;
use crate::domain::indicator::IndicatorType;
use crate::domain::ohlcv::{aggregate_weekly, OhlcvBar};
use chrono::NaiveDate;
use gate::Gate;
use levels::{Levels, RiskRules};
use std::fmt;
use std::str::FromStr;

/// Configuration shared by all strategies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyParams {
    pub risk: RiskRules,
    pub gate: Gate,
}

/// A positive match on one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub ticker: String,
    pub strategy: &'static str,
    pub as_of_index: usize,
    pub date: NaiveDate,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub label: &'static str,
    pub extras: Vec<(&'static str, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Close clears the prior box high on a volume surge.
    ConsolidationBreakout { box_period: usize, volume_surge: f64 },
    /// Close crosses up through the moving average on a volume surge.
    MaCrossBreakout { period: usize, volume_surge: f64 },
    /// Strong run over `period` bars while holding above the short MA.
    Momentum {
        period: usize,
        min_rise: f64,
        ma_period: usize,
    },
    /// High-volume shakeout followed by a reclaim of the short MA.
    Pullback {
        window: usize,
        min_drop: f64,
        volume_surge: f64,
        ma_period: usize,
    },
    /// Three tightly converged MAs, close breaks above all of them.
    MaConfluence {
        fast: usize,
        mid: usize,
        slow: usize,
        max_spread: f64,
    },
    /// Close re-enters the Bollinger band from below with %K over %D.
    BandReversion {
        period: usize,
        k_period: usize,
        d_period: usize,
    },
    /// Weekly close clears the prior weekly box on a weekly volume surge.
    WeeklyBreakout { weeks: usize, volume_surge: f64 },
}

pub const STRATEGY_NAMES: [&str; 7] = [
    "consolidation-breakout",
    "ma-cross-breakout",
    "momentum",
    "pullback",
    "ma-confluence",
    "band-reversion",
    "weekly-breakout",
];

impl Strategy {
    /// Every strategy with its default parameters.
    pub fn catalog() -> Vec<Strategy> {
        STRATEGY_NAMES
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::ConsolidationBreakout { .. } => "consolidation-breakout",
            Strategy::MaCrossBreakout { .. } => "ma-cross-breakout",
            Strategy::Momentum { .. } => "momentum",
            Strategy::Pullback { .. } => "pullback",
            Strategy::MaConfluence { .. } => "ma-confluence",
            Strategy::BandReversion { .. } => "band-reversion",
            Strategy::WeeklyBreakout { .. } => "weekly-breakout",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::ConsolidationBreakout { .. } => "Consolidation breakout on volume",
            Strategy::MaCrossBreakout { .. } => "Volume cross above moving average",
            Strategy::Momentum { .. } => "High-level momentum",
            Strategy::Pullback { .. } => "Pullback to support",
            Strategy::MaConfluence { .. } => "Moving-average confluence breakout",
            Strategy::BandReversion { .. } => "Bollinger band reversion",
            Strategy::WeeklyBreakout { .. } => "Weekly box breakout",
        }
    }

    /// Shortest history on which the rule can be evaluated.
    pub fn min_bars(&self, params: &StrategyParams) -> usize {
        let own = match *self {
            Strategy::ConsolidationBreakout { box_period, .. } => box_period + 1,
            Strategy::MaCrossBreakout { period, .. } => period + 1,
            Strategy::Momentum {
                period, ma_period, ..
            } => period.max(ma_period),
            Strategy::Pullback {
                window, ma_period, ..
            } => (ma_period + 1).max(window + 2),
            Strategy::MaConfluence { slow, .. } => slow + 1,
            Strategy::BandReversion {
                period,
                k_period,
                d_period,
            } => (period + 1).max(k_period + d_period - 1),
            Strategy::WeeklyBreakout { weeks, .. } => (weeks + 1) * 5,
        };
        own.max(params.gate.min_bars())
    }

    pub fn required_indicators(&self, params: &StrategyParams) -> Vec<IndicatorType> {
        let mut requests = match *self {
            Strategy::ConsolidationBreakout { .. } | Strategy::WeeklyBreakout { .. } => Vec::new(),
            Strategy::MaCrossBreakout { period, .. } => vec![IndicatorType::Sma(period)],
            Strategy::Momentum { ma_period, .. } | Strategy::Pullback { ma_period, .. } => {
                vec![IndicatorType::Sma(ma_period)]
            }
            Strategy::MaConfluence { fast, mid, slow, .. } => vec![
                IndicatorType::Sma(fast),
                IndicatorType::Sma(mid),
                IndicatorType::Sma(slow),
            ],
            Strategy::BandReversion {
                period,
                k_period,
                d_period,
            } => vec![
                IndicatorType::bollinger(period),
                IndicatorType::Stochastic { k_period, d_period },
            ],
        };
        requests.extend(params.gate.indicators());
        requests
    }

    /// Evaluates the rule as if bar `index` were today.
    pub fn evaluate_at(
        &self,
        data: &CodeData,
        index: usize,
        params: &StrategyParams,
    ) -> Option<Signal> {
        if index >= data.bar_count() || index + 1 < self.min_bars(params) {
            return None;
        }
        if !params.gate.passes(data, index) {
            return None;
        }

        let bars = &data.ohlcv[..=index];
        let entry = bars[index].close;
        let risk = &params.risk;

        let (levels, extras) = match *self {
            Strategy::ConsolidationBreakout {
                box_period,
                volume_surge,
            } => {
                let (box_high, box_low) = box_range(&bars[index - box_period..index]);
                let ratio = volume_ratio(bars[index].volume, bars[index - 1].volume)?;
                if entry <= box_high || ratio <= volume_surge {
                    return None;
                }
                (
                    risk.structural(entry, box_low, box_high - box_low),
                    vec![("breakout", box_high), ("volume_ratio", ratio)],
                )
            }
            Strategy::MaCrossBreakout {
                period,
                volume_surge,
            } => {
                let ma = data.value(IndicatorType::Sma(period), index)?;
                let prev_ma = data.value(IndicatorType::Sma(period), index - 1)?;
                let ratio = volume_ratio(bars[index].volume, bars[index - 1].volume)?;
                if entry <= ma || bars[index - 1].close >= prev_ma || ratio <= volume_surge {
                    return None;
                }
                (
                    risk.from_stop(entry, ma),
                    vec![("ma", ma), ("volume_ratio", ratio)],
                )
            }
            Strategy::Momentum {
                period,
                min_rise,
                ma_period,
            } => {
                let base = bars[index + 1 - period].close;
                if base <= 0.0 {
                    return None;
                }
                let rise = entry / base - 1.0;
                let ma = data.value(IndicatorType::Sma(ma_period), index)?;
                if rise <= min_rise || entry <= ma {
                    return None;
                }
                (risk.from_stop(entry, ma), vec![("rise_pct", rise * 100.0)])
            }
            Strategy::Pullback {
                window,
                min_drop,
                volume_surge,
                ma_period,
            } => {
                let ma = data.value(IndicatorType::Sma(ma_period), index)?;
                let prev_ma = data.value(IndicatorType::Sma(ma_period), index - 1)?;
                if entry <= ma || bars[index - 1].close > prev_ma {
                    return None;
                }
                let shakeout = (index - window..index).rev().find(|&j| {
                    let (bar, prev) = (&bars[j], &bars[j - 1]);
                    bar.close <= prev.close * (1.0 - min_drop)
                        && volume_ratio(bar.volume, prev.volume)
                            .is_some_and(|r| r >= volume_surge)
                })?;
                (
                    risk.from_stop(entry, ma),
                    vec![
                        ("ma", ma),
                        ("shakeout_close", bars[shakeout].close),
                        ("bars_since_shakeout", (index - shakeout) as f64),
                    ],
                )
            }
            Strategy::MaConfluence {
                fast,
                mid,
                slow,
                max_spread,
            } => {
                let now = ma_triplet(data, [fast, mid, slow], index)?;
                let prev = ma_triplet(data, [fast, mid, slow], index - 1)?;
                let (hi, lo) = (max_of(&now), min_of(&now));
                let spread = (hi - lo) / entry;
                if spread > max_spread || entry <= hi || bars[index - 1].close > max_of(&prev) {
                    return None;
                }
                (
                    risk.from_stop(entry, now[2]),
                    vec![("spread_pct", spread * 100.0)],
                )
            }
            Strategy::BandReversion {
                period,
                k_period,
                d_period,
            } => {
                let (_, middle, lower) = data.bands(IndicatorType::bollinger(period), index)?;
                let (_, _, prev_lower) = data.bands(IndicatorType::bollinger(period), index - 1)?;
                let (k, d) =
                    data.stochastic(IndicatorType::Stochastic { k_period, d_period }, index)?;
                if bars[index - 1].close >= prev_lower || entry <= lower || k <= d {
                    return None;
                }
                let floor = bars[index].low.min(bars[index - 1].low);
                (
                    risk.with_target(entry, floor, middle),
                    vec![("lower_band", lower), ("middle_band", middle), ("stoch_k", k)],
                )
            }
            Strategy::WeeklyBreakout {
                weeks,
                volume_surge,
            } => {
                // ISO weeks never exceed 7 bars, so this slice always holds
                // `weeks + 1` complete-or-current weeks when enough history exists.
                let start = index.saturating_sub((weeks + 2) * 7);
                let weekly = aggregate_weekly(&bars[start..]);
                if weekly.len() < weeks + 1 {
                    return None;
                }
                let current = &weekly[weekly.len() - 1];
                let prior = &weekly[weekly.len() - 1 - weeks..weekly.len() - 1];
                let (box_high, box_low) = box_range(prior);
                let ratio = volume_ratio(current.volume, prior[weeks - 1].volume)?;
                if current.close <= box_high || ratio <= volume_surge {
                    return None;
                }
                (
                    risk.structural(entry, box_low, box_high - box_low),
                    vec![("weekly_breakout", box_high), ("volume_ratio", ratio)],
                )
            }
        };

        Some(self.signal(data, index, entry, levels, extras))
    }

    /// Evaluates the rule on the most recent bar.
    pub fn evaluate_live(&self, data: &CodeData, params: &StrategyParams) -> Option<Signal> {
        self.evaluate_at(data, data.last_index()?, params)
    }

    /// Re-derived target for an open position at bar `index`, for strategies
    /// whose target follows an indicator. Only levels above `entry` are
    /// returned; `None` keeps the current target.
    pub fn trailing_target(&self, data: &CodeData, index: usize, entry: f64) -> Option<f64> {
        match *self {
            Strategy::BandReversion { period, .. } => data
                .bands(IndicatorType::bollinger(period), index)
                .map(|(_, middle, _)| middle)
                .filter(|&middle| middle > entry),
            _ => None,
        }
    }

    fn signal(
        &self,
        data: &CodeData,
        index: usize,
        entry: f64,
        levels: Levels,
        extras: Vec<(&'static str, f64)>,
    ) -> Signal {
        Signal {
            ticker: data.ticker.clone(),
            strategy: self.name(),
            as_of_index: index,
            date: data.ohlcv[index].date,
            entry_price: entry,
            stop_price: levels.stop,
            target_price: levels.target,
            label: self.label(),
            extras,
        }
    }
}

impl FromStr for Strategy {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let strategy = match s.trim().to_lowercase().as_str() {
            "consolidation-breakout" => Strategy::ConsolidationBreakout {
                box_period: 20,
                volume_surge: 2.0,
            },
            "ma-cross-breakout" => Strategy::MaCrossBreakout {
                period: 20,
                volume_surge: 2.0,
            },
            "momentum" => Strategy::Momentum {
                period: 20,
                min_rise: 0.10,
                ma_period: 5,
            },
            "pullback" => Strategy::Pullback {
                window: 5,
                min_drop: 0.03,
                volume_surge: 2.0,
                ma_period: 5,
            },
            "ma-confluence" => Strategy::MaConfluence {
                fast: 5,
                mid: 10,
                slow: 20,
                max_spread: 0.02,
            },
            "band-reversion" => Strategy::BandReversion {
                period: 20,
                k_period: 14,
                d_period: 3,
            },
            "weekly-breakout" => Strategy::WeeklyBreakout {
                weeks: 10,
                volume_surge: 1.5,
            },
            other => {
                return Err(ScreenerError::UnknownStrategy {
                    name: other.to_string(),
                })
            }
        };
        Ok(strategy)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses a comma-separated strategy list. An empty list selects the catalog.
pub fn parse_strategies(input: &str) -> Result<Vec<Strategy>, ScreenerError> {
    let names: Vec<&str> = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        return Ok(Strategy::catalog());
    }

    let mut selected: Vec<Strategy> = Vec::with_capacity(names.len());
    for name in names {
        let strategy: Strategy = name.parse()?;
        if !selected.iter().any(|s| s.name() == strategy.name()) {
            selected.push(strategy);
        }
    }
    Ok(selected)
}

fn volume_ratio(volume: i64, prev_volume: i64) -> Option<f64> {
    (prev_volume > 0).then(|| volume as f64 / prev_volume as f64)
}

/// `(highest high, lowest low)` over the given bars.
fn box_range(bars: &[OhlcvBar]) -> (f64, f64) {
    bars.iter().fold((f64::MIN, f64::MAX), |(hi, lo), b| {
        (hi.max(b.high), lo.min(b.low))
    })
}

fn ma_triplet(data: &CodeData, periods: [usize; 3], index: usize) -> Option<[f64; 3]> {
    Some([
        data.value(IndicatorType::Sma(periods[0]), index)?,
        data.value(IndicatorType::Sma(periods[1]), index)?,
        data.value(IndicatorType::Sma(periods[2]), index)?,
    ])
}

fn max_of(values: &[f64; 3]) -> f64 {
    values.iter().copied().fold(f64::MIN, f64::max)
}

fn min_of(values: &[f64; 3]) -> f64 {
    values.iter().copied().fold(f64::MAX, f64::min)
}
