//! Shared helpers for indicator requests and computation.

use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::sma::{calculate_sma, calculate_volume_sma};
use crate::domain::indicator::stochastic::calculate_stochastic;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use std::collections::{BTreeSet, HashMap};

pub fn calculate(bars: &[OhlcvBar], indicator_type: IndicatorType) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Sma(period) => calculate_sma(bars, period),
        IndicatorType::VolumeSma(period) => calculate_volume_sma(bars, period),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(bars, period, stddev_mult_x100),
        IndicatorType::Stochastic { k_period, d_period } => {
            calculate_stochastic(bars, k_period, d_period)
        }
    }
}

/// Computes each requested indicator once. Duplicate requests collapse.
pub fn compute_indicators(
    bars: &[OhlcvBar],
    requests: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let unique: BTreeSet<IndicatorType> = requests.iter().copied().collect();
    unique
        .into_iter()
        .map(|t| (t, calculate(bars, t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(count: usize) -> Vec<OhlcvBar> {
        (0..count)
            .map(|i| OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64),
                open: 100.0,
                high: 101.0 + i as f64,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn compute_deduplicates_requests() {
        let bars = make_bars(30);
        let map = compute_indicators(
            &bars,
            &[
                IndicatorType::Sma(5),
                IndicatorType::Sma(5),
                IndicatorType::VolumeSma(5),
            ],
        );
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn every_series_is_aligned_with_bars() {
        let bars = make_bars(25);
        let map = compute_indicators(
            &bars,
            &[
                IndicatorType::Sma(20),
                IndicatorType::bollinger(20),
                IndicatorType::Stochastic {
                    k_period: 14,
                    d_period: 3,
                },
            ],
        );
        for (t, series) in &map {
            assert_eq!(series.values.len(), bars.len(), "{t}");
            assert_eq!(series.indicator_type, *t);
            for (i, p) in series.values.iter().enumerate() {
                assert_eq!(p.valid, i + 1 >= t.warmup(), "{t} at {i}");
                assert_eq!(p.date, bars[i].date);
            }
        }
    }

    #[test]
    fn input_bars_untouched() {
        let bars = make_bars(10);
        let before = bars.clone();
        let _ = compute_indicators(&bars, &[IndicatorType::bollinger(3)]);
        assert_eq!(bars, before);
    }
}
