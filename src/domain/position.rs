//! Open position and closed trade records for the single-position backtest.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_index: usize,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    Target,
    Stop,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Target => f.write_str("target"),
            ExitReason::Stop => f.write_str("stop"),
        }
    }
}

impl Position {
    /// Limit fill: the high touching the target counts.
    pub fn should_take_profit(&self, high: f64) -> bool {
        high >= self.target_price
    }

    /// Close-based stop: intrabar lows do not trigger.
    pub fn should_stop_loss(&self, close: f64) -> bool {
        close < self.stop_price
    }

    /// Exit decision for one bar. Target wins when both trigger.
    pub fn exit_on(&self, high: f64, close: f64) -> Option<(ExitReason, f64)> {
        if self.should_take_profit(high) {
            Some((ExitReason::Target, self.target_price))
        } else if self.should_stop_loss(close) {
            Some((ExitReason::Stop, close))
        } else {
            None
        }
    }

    pub fn close(self, exit_index: usize, exit_price: f64, reason: ExitReason) -> Trade {
        Trade {
            entry_index: self.entry_index,
            exit_index,
            entry_price: self.entry_price,
            exit_price,
            return_pct: (exit_price - self.entry_price) / self.entry_price * 100.0,
            exit_reason: reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Percentage return, e.g. 5.0 for +5%.
    pub return_pct: f64,
    pub exit_reason: ExitReason,
}
