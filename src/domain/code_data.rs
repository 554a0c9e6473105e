//! Per-ticker bar history with its computed indicators.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::ohlcv::OhlcvBar;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CodeData {
    pub ticker: String,
    pub ohlcv: Vec<OhlcvBar>,
    pub indicators: HashMap<IndicatorType, IndicatorSeries>,
}

impl CodeData {
    pub fn new(ticker: String, ohlcv: Vec<OhlcvBar>) -> Self {
        Self {
            ticker,
            ohlcv,
            indicators: HashMap::new(),
        }
    }

    /// Builds the data set and computes `requests` over the bars.
    pub fn with_indicators(ticker: String, ohlcv: Vec<OhlcvBar>, requests: &[IndicatorType]) -> Self {
        let indicators = compute_indicators(&ohlcv, requests);
        Self {
            ticker,
            ohlcv,
            indicators,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.ohlcv.len()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.ohlcv.len().checked_sub(1)
    }

    pub fn bar(&self, index: usize) -> Option<&OhlcvBar> {
        self.ohlcv.get(index)
    }

    /// Scalar indicator value; `None` when not computed or still warming up.
    pub fn value(&self, indicator_type: IndicatorType, index: usize) -> Option<f64> {
        self.indicators.get(&indicator_type)?.simple(index)
    }

    pub fn bands(&self, indicator_type: IndicatorType, index: usize) -> Option<(f64, f64, f64)> {
        self.indicators.get(&indicator_type)?.bands(index)
    }

    pub fn stochastic(&self, indicator_type: IndicatorType, index: usize) -> Option<(f64, f64)> {
        self.indicators.get(&indicator_type)?.stochastic(index)
    }
}
