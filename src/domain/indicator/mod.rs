//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values, index-aligned with its bars
//!
//! Every series has exactly one point per input bar. A point is `valid` only
//! once its trailing window is full, and its value depends on bars `0..=i` alone.

pub mod bollinger;
pub mod sma;
pub mod stochastic;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Stochastic { k: f64, d: f64 },
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    /// Moving average of closes.
    Sma(usize),
    /// Moving average of volumes.
    VolumeSma(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
}

impl IndicatorType {
    /// Bollinger bands with the conventional 2-sigma width.
    pub const fn bollinger(period: usize) -> Self {
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100: 200,
        }
    }

    /// Number of bars needed before the first valid point.
    pub fn warmup(&self) -> usize {
        match *self {
            IndicatorType::Sma(period)
            | IndicatorType::VolumeSma(period)
            | IndicatorType::Bollinger { period, .. } => period,
            IndicatorType::Stochastic { k_period, d_period } => {
                (k_period + d_period).saturating_sub(1)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    fn valid_at(&self, index: usize) -> Option<&IndicatorValue> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| &p.value)
    }

    /// Scalar value at `index`, or `None` while warming up.
    pub fn simple(&self, index: usize) -> Option<f64> {
        match self.valid_at(index)? {
            IndicatorValue::Simple(v) => Some(*v),
            _ => None,
        }
    }

    /// `(upper, middle, lower)` at `index`.
    pub fn bands(&self, index: usize) -> Option<(f64, f64, f64)> {
        match self.valid_at(index)? {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => Some((*upper, *middle, *lower)),
            _ => None,
        }
    }

    /// `(%K, %D)` at `index`.
    pub fn stochastic(&self, index: usize) -> Option<(f64, f64)> {
        match self.valid_at(index)? {
            IndicatorValue::Stochastic { k, d } => Some((*k, *d)),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "MA({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VMA({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
        }
    }
}
