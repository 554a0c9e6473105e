//! OHLCV bar representation and interval aggregation.

use chrono::{Datelike, IsoWeek, NaiveDate};

/// Shares per board lot on the Taiwan exchanges.
pub const BOARD_LOT: i64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// Volume expressed in board lots.
    pub fn lots(&self) -> f64 {
        self.volume as f64 / BOARD_LOT as f64
    }
}

/// Folds daily bars into ISO-week bars.
///
/// Each weekly bar is dated by its last trading day, so the final (possibly
/// incomplete) week is still emitted. Input must be ordered by date.
pub fn aggregate_weekly(bars: &[OhlcvBar]) -> Vec<OhlcvBar> {
    let mut weeks: Vec<OhlcvBar> = Vec::new();
    let mut current: Option<IsoWeek> = None;

    for bar in bars {
        let week = bar.date.iso_week();
        match weeks.last_mut() {
            Some(last) if current == Some(week) => {
                last.date = bar.date;
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume += bar.volume;
            }
            _ => {
                current = Some(week);
                weeks.push(bar.clone());
            }
        }
    }

    weeks
}
