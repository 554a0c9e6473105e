//! Ticker universe provider port.

use crate::domain::error::ScreenerError;
use crate::domain::universe::Ticker;

pub trait UniversePort: Send + Sync {
    fn list_tickers(&self) -> Result<Vec<Ticker>, ScreenerError>;
}
