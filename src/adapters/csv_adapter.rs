//! CSV directory data adapter.
//!
//! One file per ticker, `<TICKER>.csv`, with a
//! `date,open,high,low,close,volume` header.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::Ticker;
use crate::ports::data_port::DataPort;
use crate::ports::universe_port::UniversePort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }
}

fn field<T: FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    ticker: &str,
) -> Result<T, ScreenerError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(idx).ok_or_else(|| ScreenerError::DataFetch {
        ticker: ticker.to_string(),
        reason: format!("missing {name} column"),
    })?;
    raw.trim().parse().map_err(|e| ScreenerError::DataFetch {
        ticker: ticker.to_string(),
        reason: format!("invalid {name} value '{raw}': {e}"),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScreenerError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| ScreenerError::DataFetch {
            ticker: ticker.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| ScreenerError::DataFetch {
                ticker: ticker.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;

            let date_str: String = field(&record, 0, "date", ticker)?;
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                ScreenerError::DataFetch {
                    ticker: ticker.to_string(),
                    reason: format!("invalid date format: {e}"),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                date,
                open: field(&record, 1, "open", ticker)?,
                high: field(&record, 2, "high", ticker)?,
                low: field(&record, 3, "low", ticker)?,
                close: field(&record, 4, "close", ticker)?,
                volume: field(&record, 5, "volume", ticker)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Ok(bars)
    }
}

/// Every `<TICKER>.csv` in the directory, sorted.
impl UniversePort for CsvAdapter {
    fn list_tickers(&self) -> Result<Vec<Ticker>, ScreenerError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ScreenerError::Universe {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                tickers.push(Ticker::new(symbol));
            }
        }

        tickers.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n";

        fs::write(path.join("2330.TW.csv"), csv_content).unwrap();
        fs::write(path.join("2317.TW.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(
            path.join("1101.TW.csv"),
            "date,open,high,low,close,volume\n2024-01-15,40,41,39,abc,100\n",
        )
        .unwrap();
        fs::write(path.join("README.txt"), "not data").unwrap();

        (dir, path)
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn fetch_ohlcv_returns_sorted_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_ohlcv("2330.TW", jan(1), jan(31)).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, jan(15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
        assert_eq!(bars[2].date, jan(17));
    }

    #[test]
    fn fetch_ohlcv_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_ohlcv("2330.TW", jan(16), jan(16)).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, jan(16));
    }

    #[test]
    fn empty_file_is_empty_series() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(adapter.fetch_ohlcv("2317.TW", jan(1), jan(31)).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_fetch_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let err = adapter.fetch_ohlcv("9999.TW", jan(1), jan(31)).unwrap_err();
        assert!(matches!(err, ScreenerError::DataFetch { ticker, .. } if ticker == "9999.TW"));
    }

    #[test]
    fn bad_value_is_fetch_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let err = adapter.fetch_ohlcv("1101.TW", jan(1), jan(31)).unwrap_err();
        assert!(err.to_string().contains("invalid close value"));
    }

    #[test]
    fn list_tickers_returns_csv_files() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let tickers = adapter.list_tickers().unwrap();
        let symbols: Vec<&str> = tickers.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["1101.TW", "2317.TW", "2330.TW"]);
    }
}
