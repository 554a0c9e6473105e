//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;
    let middle = calculate_sma(bars, period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let bands = middle.simple(i).map(|mid| {
                let window = &bars[i + 1 - period..=i];
                let variance = window
                    .iter()
                    .map(|b| (b.close - mid).powi(2))
                    .sum::<f64>()
                    / period as f64;
                let width = mult * variance.sqrt();
                (mid + width, mid, mid - width)
            });

            let (upper, middle, lower) = bands.unwrap_or((0.0, 0.0, 0.0));
            IndicatorPoint {
                date: bar.date,
                valid: bands.is_some(),
                value: IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}
