//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod indicator;
pub mod indicator_helpers;
pub mod backtest;
pub mod metrics;
pub mod strategy;
pub mod universe;
pub mod code_data;
pub mod scan;
pub mod session;
pub mod config_validation;
pub mod error;
