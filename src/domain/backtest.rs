//! Single-position backtest replay.
//!
//! A two-state machine (flat / in position) walks the lookback window bar by
//! bar and asks the strategy the same question the live scan asks, at each
//! historical index:
//!
//! - flat: a signal at bar `i` opens a position at `close[i]` with the signal's
//!   stop and target. Exits are checked from bar `i + 1` on.
//! - in position: the target (for trailing strategies) is refreshed from bar
//!   `i`, then `high >= target` exits at the target price, otherwise
//!   `close < stop` exits at the close. A bar that exits does not re-enter.
//!
//! The last bar is never processed. A position still open when the window
//! ends is dropped from the statistics.

use crate::domain::code_data::CodeData;
use crate::domain::metrics::BacktestSummary;
use crate::domain::position::{Position, Trade};
use crate::domain::strategy::{Strategy, StrategyParams};

pub const TRADING_DAYS_PER_MONTH: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktestConfig {
    /// Number of most recent bars replayed.
    pub lookback_bars: usize,
}

impl BacktestConfig {
    pub fn from_months(months: usize) -> Self {
        Self {
            lookback_bars: months * TRADING_DAYS_PER_MONTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy: &'static str,
    pub trades: Vec<Trade>,
    /// Bars on which a signal opened a position.
    pub entries: usize,
    /// Position left open at the end of the window, excluded from `summary`.
    pub open_position: Option<Position>,
    pub summary: BacktestSummary,
}

enum State {
    Flat,
    InPosition(Position),
}

pub fn run_backtest(
    strategy: &Strategy,
    data: &CodeData,
    params: &StrategyParams,
    config: &BacktestConfig,
) -> BacktestResult {
    let len = data.bar_count();
    let last = len.saturating_sub(1);
    let warmup = strategy.min_bars(params).saturating_sub(1);
    let start = len.saturating_sub(config.lookback_bars).max(warmup);

    let mut trades = Vec::new();
    let mut entries = 0usize;
    let mut state = State::Flat;

    for i in start..last {
        state = match state {
            State::Flat => match strategy.evaluate_at(data, i, params) {
                Some(signal) => {
                    entries += 1;
                    State::InPosition(Position {
                        entry_index: i,
                        entry_price: signal.entry_price,
                        stop_price: signal.stop_price,
                        target_price: signal.target_price,
                    })
                }
                None => State::Flat,
            },
            State::InPosition(mut position) => {
                if let Some(target) = strategy.trailing_target(data, i, position.entry_price) {
                    position.target_price = target;
                }
                let bar = &data.ohlcv[i];
                match position.exit_on(bar.high, bar.close) {
                    Some((reason, price)) => {
                        trades.push(position.close(i, price, reason));
                        State::Flat
                    }
                    None => State::InPosition(position),
                }
            }
        };
    }

    let open_position = match state {
        State::Flat => None,
        State::InPosition(position) => Some(position),
    };
    let summary = BacktestSummary::compute(&trades);

    BacktestResult {
        strategy: strategy.name(),
        trades,
        entries,
        open_position,
        summary,
    }
}
