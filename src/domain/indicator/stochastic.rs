//! Stochastic oscillator (%K, %D).
//!
//! %K[i] = 100 * (C[i] - LL) / (HH - LL), where HH/LL are the highest high and
//! lowest low of the trailing `k_period` bars. A flat window (HH == LL) reads 50.
//! %D[i] = mean of the last `d_period` %K values.
//! Warmup: first (k_period + d_period - 2) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stochastic(bars: &[OhlcvBar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut k_values: Vec<f64> = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let k = if k_period > 0 && i + 1 >= k_period {
            let window = &bars[i + 1 - k_period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = hh - ll;
            let k = if range > 0.0 {
                100.0 * (bar.close - ll) / range
            } else {
                50.0
            };
            k_values.push(k);
            Some(k)
        } else {
            None
        };

        let d = match k {
            Some(_) if d_period > 0 && k_values.len() >= d_period => {
                let tail = &k_values[k_values.len() - d_period..];
                Some(tail.iter().sum::<f64>() / d_period as f64)
            }
            _ => None,
        };

        let (valid, value) = match (k, d) {
            (Some(k), Some(d)) => (true, IndicatorValue::Stochastic { k, d }),
            _ => (false, IndicatorValue::Stochastic { k: 0.0, d: 0.0 }),
        };

        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Stochastic { k_period, d_period },
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn stochastic_warmup() {
        let bars: Vec<OhlcvBar> = (1..=6).map(|d| make_bar(d, 12.0, 8.0, 10.0)).collect();
        let series = calculate_stochastic(&bars, 3, 2);

        assert_eq!(series.values.len(), 6);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(!series.values[2].valid);
        assert!(series.values[3].valid);
        assert!(series.values[5].valid);
    }

    #[test]
    fn stochastic_k_position_in_range() {
        let bars = vec![
            make_bar(1, 10.0, 0.0, 5.0),
            make_bar(2, 10.0, 0.0, 5.0),
            make_bar(3, 10.0, 0.0, 10.0),
            make_bar(4, 10.0, 0.0, 0.0),
        ];
        let series = calculate_stochastic(&bars, 3, 2);

        let (k, d) = series.stochastic(3).unwrap();
        assert_relative_eq!(k, 0.0);
        // %K at index 2 was 100, at index 3 is 0.
        assert_relative_eq!(d, 50.0);
    }

    #[test]
    fn stochastic_flat_window_is_neutral() {
        let bars: Vec<OhlcvBar> = (1..=4).map(|d| make_bar(d, 10.0, 10.0, 10.0)).collect();
        let series = calculate_stochastic(&bars, 2, 2);
        let (k, d) = series.stochastic(3).unwrap();
        assert_relative_eq!(k, 50.0);
        assert_relative_eq!(d, 50.0);
    }

    #[test]
    fn stochastic_bounded() {
        let bars: Vec<OhlcvBar> = (1..=20)
            .map(|d| {
                let c = 10.0 + (d as f64 * 1.7).sin() * 3.0;
                make_bar(d, c + 1.0, c - 1.0, c)
            })
            .collect();
        let series = calculate_stochastic(&bars, 5, 3);
        for i in 0..bars.len() {
            if let Some((k, d)) = series.stochastic(i) {
                assert!((0.0..=100.0).contains(&k));
                assert!((0.0..=100.0).contains(&d));
            }
        }
    }
}
