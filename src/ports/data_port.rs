//! Market data provider port.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

/// Source of daily bars. Implementations may return an empty or short series
/// for illiquid or delisted tickers; that is not an error.
pub trait DataPort: Send + Sync {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScreenerError>;

    /// One request for several tickers. Providers with a native batch
    /// endpoint override this; results are returned in input order.
    fn fetch_batch(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Vec<Result<Vec<OhlcvBar>, ScreenerError>> {
        tickers
            .iter()
            .map(|t| self.fetch_ohlcv(t, start_date, end_date))
            .collect()
    }
}
