//! CLI integration tests: config files on disk, CSV data directories and the
//! command helpers that sit between them and the domain.

mod common;

use common::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use twscreen::adapters::file_config_adapter::FileConfigAdapter;
use twscreen::cli::{self, Overrides};
use twscreen::domain::config_validation::validate_scan_config;
use twscreen::domain::error::ScreenerError;
use twscreen::domain::session::ScanSession;
use twscreen::domain::universe::Ticker;
use twscreen::ports::config_port::ConfigPort;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn write_csv(dir: &Path, ticker: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    fs::write(dir.join(format!("{ticker}.csv")), content).unwrap();
}

fn ini_for(dir: &Path, extra: &str) -> String {
    format!(
        "[data]\npath = {}\ncache_ttl_secs = 0\n\n[universe]\nsource = manual\ntickers = 2330.TW,2317.TW\n\n[scan]\nstrategies = consolidation-breakout\nthrottle_ms = 0\nas_of = 2023-01-23\n{extra}",
        dir.display()
    )
}

mod config_loading {
    use super::*;

    #[test]
    fn build_scan_config_defaults() {
        let adapter = FileConfigAdapter::from_string("[universe]\ntickers = 2330.TW\n").unwrap();
        let today = date(2024, 6, 28);
        let config = cli::build_scan_config(&adapter, today).unwrap();

        assert_eq!(config.strategies.len(), 7);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.fetch_concurrency, 4);
        assert_eq!(config.throttle, Duration::from_millis(300));
        assert_eq!(config.backtest.unwrap().lookback_bars, 126);
        assert_eq!(config.end_date, today);
        assert_eq!(config.start_date, date(2023, 5, 25));
        assert!((config.params.risk.risk_reward_ratio - 1.5).abs() < f64::EPSILON);
        assert!((config.params.risk.min_risk_fraction - 0.01).abs() < f64::EPSILON);
        assert!(config.params.gate.trend_mas.is_empty());
    }

    #[test]
    fn build_scan_config_reads_every_section() {
        let ini = r#"
[universe]
tickers = 2330.TW

[scan]
strategies = momentum, pullback
backtest = false
batch_size = 5
throttle_ms = 0
fetch_concurrency = 2
history_days = 200
as_of = 2024-03-01

[risk]
risk_reward_ratio = 2
min_risk_pct = 2.5
min_volume_lots = 300
trend_mas = 20,60
"#;
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let config = cli::build_scan_config(&adapter, date(2030, 1, 1)).unwrap();

        let names: Vec<&str> = config.strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["momentum", "pullback"]);
        assert!(config.backtest.is_none());
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.throttle, Duration::ZERO);
        assert_eq!(config.end_date, date(2024, 3, 1));
        assert_eq!(config.start_date, date(2023, 8, 14));
        assert!((config.params.risk.risk_reward_ratio - 2.0).abs() < f64::EPSILON);
        assert!((config.params.risk.min_risk_fraction - 0.025).abs() < 1e-12);
        assert!((config.params.gate.min_volume_lots - 300.0).abs() < f64::EPSILON);
        assert_eq!(config.params.gate.trend_mas, vec![20, 60]);
    }

    #[test]
    fn history_is_extended_to_cover_lookback() {
        let ini = "[universe]\ntickers = 2330.TW\n[scan]\nhistory_days = 30\nlookback_months = 12\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let config = cli::build_scan_config(&adapter, date(2024, 6, 28)).unwrap();
        // 252 replay bars plus 55 warm-up bars
        let days = (config.end_date - config.start_date).num_days();
        assert!(days >= 307 * 7 / 5, "only {days} days requested");
    }

    #[test]
    fn unknown_strategy_is_config_error() {
        let adapter =
            FileConfigAdapter::from_string("[scan]\nstrategies = momentum,moonshot\n").unwrap();
        let err = cli::build_scan_config(&adapter, date(2024, 6, 28)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn overrides_reach_validation() {
        let file = FileConfigAdapter::from_string("[universe]\nsource = manual\n").unwrap();
        assert!(validate_scan_config(&file).is_err());

        let overrides = Overrides {
            tickers: Some("2330.TW".into()),
            ..Overrides::default()
        };
        let config = overrides.apply(&file);
        assert!(validate_scan_config(&config).is_ok());
    }

    #[test]
    fn lookback_override_is_validated() {
        let file = FileConfigAdapter::from_string(
            "[universe]\ntickers = 2330.TW\n[scan]\nstrategies = weekly-breakout\n",
        )
        .unwrap();
        let overrides = Overrides {
            lookback_months: Some(1),
            ..Overrides::default()
        };
        let err = validate_scan_config(&overrides.apply(&file)).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "lookback_months"));

        let overrides = Overrides {
            lookback_months: Some(1),
            no_backtest: true,
            ..Overrides::default()
        };
        assert!(validate_scan_config(&overrides.apply(&file)).is_ok());
    }

    #[test]
    fn load_config_missing_file_fails() {
        assert!(cli::load_config(Path::new("/nonexistent/path/config.ini")).is_err());
    }

    #[test]
    fn data_path_is_required() {
        let adapter = FileConfigAdapter::from_string("[universe]\ntickers = 2330.TW\n").unwrap();
        let err = cli::build_data_port(&adapter).err().unwrap();
        assert!(matches!(err, ScreenerError::ConfigMissing { key, .. } if key == "path"));
    }
}

mod universe {
    use super::*;

    #[test]
    fn full_market_from_data_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv(dir.path(), "2330.TW", &flat_bars(3, 500.0));
        write_csv(dir.path(), "1101.TW", &flat_bars(3, 40.0));
        write_csv(dir.path(), "2317.TW", &flat_bars(3, 100.0));
        let ini = format!(
            "[data]\npath = {}\n[universe]\nsource = full\nlimit = 2\n",
            dir.path().display()
        );
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let universe = cli::build_universe_port(&adapter).unwrap();
        let tickers = cli::resolve_tickers(&adapter, universe.as_ref()).unwrap();

        let symbols: Vec<&str> = tickers.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["1101.TW", "2317.TW"]);
    }

    #[test]
    fn full_market_from_listing_file() {
        let listing = write_temp_ini("code,name\n2330,TSMC\n2317,Hon Hai\n00878,ETF\n");
        let ini = format!(
            "[universe]\nsource = full\nlisting = {}\nsuffix = .TW\n",
            listing.path().display()
        );
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let universe = cli::build_universe_port(&adapter).unwrap();
        let tickers = cli::resolve_tickers(&adapter, universe.as_ref()).unwrap();

        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[1].symbol, "2330.TW");
        assert_eq!(tickers[1].name.as_deref(), Some("TSMC"));
    }

    #[test]
    fn manual_universe_uppercases() {
        let adapter =
            FileConfigAdapter::from_string("[universe]\nsource = manual\ntickers = 2330.tw, 2317.tw\n")
                .unwrap();
        let universe = MockUniverse;
        let tickers = cli::resolve_tickers(&adapter, &universe).unwrap();
        assert_eq!(tickers, vec![Ticker::new("2330.TW"), Ticker::new("2317.TW")]);
    }

    struct MockUniverse;

    impl twscreen::ports::universe_port::UniversePort for MockUniverse {
        fn list_tickers(&self) -> Result<Vec<Ticker>, ScreenerError> {
            Ok(Vec::new())
        }
    }
}

mod pipeline_csv {
    use super::*;

    #[test]
    fn scan_reads_csv_directory_and_exports() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv(dir.path(), "2330.TW", &breakout_bars());
        write_csv(dir.path(), "2317.TW", &flat_bars(22, 100.0));
        let adapter = FileConfigAdapter::from_string(&ini_for(dir.path(), "")).unwrap();

        validate_scan_config(&adapter).unwrap();
        let scan_config = cli::build_scan_config(&adapter, date(2030, 1, 1)).unwrap();
        assert_eq!(scan_config.end_date, date(2023, 1, 23));
        let data_port = cli::build_data_port(&adapter).unwrap();
        let universe = cli::build_universe_port(&adapter).unwrap();
        let tickers = cli::resolve_tickers(&adapter, universe.as_ref()).unwrap();

        let output = dir.path().join("matches.csv");
        let mut session = ScanSession::new();
        let report =
            cli::run_scan_pipeline(&data_port, &tickers, &scan_config, &mut session, Some(&output))
                .unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].ticker, "2330.TW");
        assert!(report.results[0].is_new);

        let exported = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = exported.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("2330.TW,,consolidation-breakout,"));
    }

    #[test]
    fn all_tickers_failing_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let adapter = FileConfigAdapter::from_string(&ini_for(dir.path(), "")).unwrap();
        let scan_config = cli::build_scan_config(&adapter, date(2030, 1, 1)).unwrap();
        let data_port = cli::build_data_port(&adapter).unwrap();
        let tickers = vec![Ticker::new("2330.TW"), Ticker::new("2317.TW")];

        let err = cli::run_scan_pipeline(
            &data_port,
            &tickers,
            &scan_config,
            &mut ScanSession::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ScreenerError::DataFetch { .. }));
    }

    #[test]
    fn report_lists_each_strategy() {
        let port = MockDataPort::new().with_bars("2330.TW", breakout_bars());
        let adapter = FileConfigAdapter::from_string(
            "[universe]\ntickers = 2330.TW\n[scan]\nstrategies = consolidation-breakout,momentum\nbacktest = false\nthrottle_ms = 0\n",
        )
        .unwrap();
        let scan_config = cli::build_scan_config(&adapter, date(2024, 1, 1)).unwrap();
        let report = cli::run_scan_pipeline(
            &port,
            &[Ticker::new("2330.TW")],
            &scan_config,
            &mut ScanSession::new(),
            None,
        )
        .unwrap();

        let text = cli::format_report(&report, &scan_config.strategies);
        assert!(text.contains("(consolidation-breakout)"));
        assert!(text.contains("(momentum) ==\nno matches"));
        assert!(text.contains("* 2330.TW"));
        assert!(text.contains("scanned 1 tickers: 1 matches, 0 failed"));
    }
}

mod backtest_command {
    use super::*;

    fn config(strategy: &str, lookback: u32) -> twscreen::domain::scan::ScanConfig {
        let adapter = FileConfigAdapter::from_string("[universe]\ntickers = 2330.TW\n").unwrap();
        let overrides = Overrides {
            strategies: Some(strategy.into()),
            lookback_months: Some(lookback),
            ..Overrides::default()
        };
        let overlay = overrides.apply(&adapter);
        assert_eq!(overlay.get_string("scan", "strategies").as_deref(), Some(strategy));
        cli::build_scan_config(&overlay, date(2024, 1, 1)).unwrap()
    }

    #[test]
    fn lists_trades_and_summary() {
        let mut bars = breakout_bars();
        bars.push(make_bar(22, 105.0, 106.0, 104.0, 105.0, 1000));
        bars.push(make_bar(23, 105.0, 109.0, 105.0, 108.5, 1000));
        bars.push(make_bar(24, 108.0, 108.0, 107.0, 107.0, 1000));
        let port = MockDataPort::new().with_bars("2603.TW", bars);

        let text = cli::backtest_ticker(&port, "2603.TW", &config("consolidation-breakout", 2)).unwrap();
        assert!(text.contains("2023-01-23 -> 2023-01-25"));
        assert!(text.contains("target"));
        assert!(text.contains("1 trades, 1 won, 0 lost, win rate 100.0%"));
    }

    #[test]
    fn short_history_is_insufficient() {
        let port = MockDataPort::new().with_bars("2603.TW", flat_bars(10, 50.0));
        let err = cli::backtest_ticker(&port, "2603.TW", &config("consolidation-breakout", 2)).unwrap_err();
        assert!(matches!(
            err,
            ScreenerError::InsufficientData { bars: 10, minimum: 21, .. }
        ));
    }

    #[test]
    fn empty_history_is_no_data() {
        let port = MockDataPort::new();
        let err = cli::backtest_ticker(&port, "2603.TW", &config("momentum", 2)).unwrap_err();
        assert!(matches!(err, ScreenerError::NoData { .. }));
    }
}
