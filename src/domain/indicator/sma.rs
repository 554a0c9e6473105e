//! Simple Moving Average of closes and of volumes.
//!
//! O(n) running-sum implementation.
//! SMA(n)[i] = (P[i-n+1] + ... + P[i]) / n
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: rolling_mean(bars, period, |b| b.close),
    }
}

pub fn calculate_volume_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::VolumeSma(period),
        values: rolling_mean(bars, period, |b| b.volume as f64),
    }
}

fn rolling_mean(
    bars: &[OhlcvBar],
    period: usize,
    price: impl Fn(&OhlcvBar) -> f64,
) -> Vec<IndicatorPoint> {
    let mut values = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        window_sum += price(bar);
        if period > 0 && i >= period {
            window_sum -= price(&bars[i - period]);
        }

        let valid = period > 0 && i + 1 >= period;
        let mean = if valid { window_sum / period as f64 } else { 0.0 };

        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Simple(mean),
        });
    }

    values
}
