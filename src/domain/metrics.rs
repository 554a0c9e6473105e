//! Trade outcome aggregation.

use super::position::Trade;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeSummary {
    /// Share of trades with a positive return, in percent (0..=100).
    pub win_rate: f64,
    /// Mean percentage return per trade.
    pub avg_return: f64,
    pub trade_count: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub best_return: f64,
    pub worst_return: f64,
}

/// Aggregate outcome of one backtest run. A run without closed trades is
/// reported as `NoSignals` rather than a 0% win rate.
#[derive(Debug, Clone, PartialEq)]
pub enum BacktestSummary {
    NoSignals,
    Trades(TradeSummary),
}

impl BacktestSummary {
    pub fn compute(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return BacktestSummary::NoSignals;
        }

        let trade_count = trades.len();
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total = 0.0_f64;
        let mut best_return = f64::MIN;
        let mut worst_return = f64::MAX;

        for trade in trades {
            let r = trade.return_pct;
            if r > 0.0 {
                trades_won += 1;
            } else if r < 0.0 {
                trades_lost += 1;
            }
            total += r;
            best_return = best_return.max(r);
            worst_return = worst_return.min(r);
        }

        BacktestSummary::Trades(TradeSummary {
            win_rate: trades_won as f64 / trade_count as f64 * 100.0,
            avg_return: total / trade_count as f64,
            trade_count,
            trades_won,
            trades_lost,
            best_return,
            worst_return,
        })
    }

    pub fn trades(&self) -> Option<&TradeSummary> {
        match self {
            BacktestSummary::NoSignals => None,
            BacktestSummary::Trades(summary) => Some(summary),
        }
    }

    pub fn trade_count(&self) -> usize {
        self.trades().map_or(0, |s| s.trade_count)
    }
}
