//! Volume floor and trend filter applied ahead of every strategy rule.

use crate::domain::code_data::CodeData;
use crate::domain::indicator::IndicatorType;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gate {
    /// Minimum bar volume in board lots; 0 disables the floor.
    pub min_volume_lots: f64,
    /// Close must sit strictly above each of these moving averages.
    pub trend_mas: Vec<usize>,
}

impl Gate {
    pub fn indicators(&self) -> Vec<IndicatorType> {
        self.trend_mas.iter().map(|&n| IndicatorType::Sma(n)).collect()
    }

    pub fn min_bars(&self) -> usize {
        self.trend_mas.iter().copied().max().unwrap_or(0)
    }

    pub fn passes(&self, data: &CodeData, index: usize) -> bool {
        let Some(bar) = data.bar(index) else {
            return false;
        };
        if bar.lots() < self.min_volume_lots {
            return false;
        }
        self.trend_mas.iter().all(|&n| {
            data.value(IndicatorType::Sma(n), index)
                .is_some_and(|ma| bar.close > ma)
        })
    }
}
