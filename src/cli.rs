//! CLI definition and dispatch.

use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::adapters::cache::{CachedDataPort, CachedUniverse};
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_export_adapter::CsvExportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::ticker_list_adapter::TickerListAdapter;
use crate::domain::backtest::{run_backtest, BacktestConfig, TRADING_DAYS_PER_MONTH};
use crate::domain::code_data::CodeData;
use crate::domain::config_validation::{parse_as_of, parse_ma_list, validate_scan_config};
use crate::domain::error::ScreenerError;
use crate::domain::metrics::BacktestSummary;
use crate::domain::scan::{run_scan, ScanConfig, ScanReport};
use crate::domain::session::ScanSession;
use crate::domain::strategy::gate::Gate;
use crate::domain::strategy::levels::RiskRules;
use crate::domain::strategy::{parse_strategies, Strategy, StrategyParams};
use crate::domain::universe::{resolve_universe, Ticker, UniverseSource};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::universe_port::UniversePort;

#[derive(Parser, Debug)]
#[command(name = "twscreen", about = "Technical-signal screener for Taiwan equities")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the universe for live signals
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated tickers; replaces the configured universe
        #[arg(long)]
        tickers: Option<String>,
        /// Comma-separated strategy names
        #[arg(long)]
        strategies: Option<String>,
        #[arg(long)]
        no_backtest: bool,
        #[arg(long)]
        lookback_months: Option<u32>,
        /// Write matches as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of scan rounds; later rounds flag only new matches
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        /// Pause between rounds, in seconds
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
    },
    /// Replay one strategy over one ticker and list the trades
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        strategy: String,
        #[arg(long)]
        lookback_months: Option<u32>,
    },
    /// List available strategies
    ListStrategies,
    /// List the tickers the configured universe resolves to
    ListTickers {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a scan configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Scan {
            config,
            tickers,
            strategies,
            no_backtest,
            lookback_months,
            output,
            repeat,
            interval_secs,
        } => {
            let overrides = Overrides {
                tickers,
                strategies,
                no_backtest,
                lookback_months,
            };
            run_scan_command(
                &config,
                overrides,
                output.as_deref(),
                repeat,
                Duration::from_secs(interval_secs),
            )
        }
        Command::Backtest {
            config,
            ticker,
            strategy,
            lookback_months,
        } => run_backtest_command(&config, &ticker, &strategy, lookback_months),
        Command::ListStrategies => run_list_strategies(),
        Command::ListTickers { config } => run_list_tickers(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ScreenerError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: &ScreenerError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub tickers: Option<String>,
    pub strategies: Option<String>,
    pub no_backtest: bool,
    pub lookback_months: Option<u32>,
}

impl Overrides {
    pub fn apply<'a>(&self, base: &'a dyn ConfigPort) -> OverlayConfig<'a> {
        let mut values = HashMap::new();
        let mut set = |section: &str, key: &str, value: String| {
            values.insert((section.to_string(), key.to_string()), value);
        };
        if let Some(tickers) = &self.tickers {
            set("universe", "source", "manual".to_string());
            set("universe", "tickers", tickers.clone());
        }
        if let Some(strategies) = &self.strategies {
            set("scan", "strategies", strategies.clone());
        }
        if self.no_backtest {
            set("scan", "backtest", "false".to_string());
        }
        if let Some(months) = self.lookback_months {
            set("scan", "lookback_months", months.to_string());
        }
        OverlayConfig { base, values }
    }
}

/// A config view where overridden keys shadow the underlying file.
pub struct OverlayConfig<'a> {
    base: &'a dyn ConfigPort,
    values: HashMap<(String, String), String>,
}

impl OverlayConfig<'_> {
    fn get(&self, section: &str, key: &str) -> Option<&String> {
        self.values.get(&(section.to_string(), key.to_string()))
    }
}

impl ConfigPort for OverlayConfig<'_> {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match self.get(section, key) {
            Some(v) => Some(v.clone()),
            None => self.base.get_string(section, key),
        }
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        match self.get(section, key) {
            Some(v) => v.parse().unwrap_or(default),
            None => self.base.get_int(section, key, default),
        }
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        match self.get(section, key) {
            Some(v) => v.parse().unwrap_or(default),
            None => self.base.get_double(section, key, default),
        }
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        match self.get(section, key).map(String::as_str) {
            Some("true") => true,
            Some("false") => false,
            Some(_) => default,
            None => self.base.get_bool(section, key, default),
        }
    }
}

pub fn build_params(config: &dyn ConfigPort) -> Result<StrategyParams, ScreenerError> {
    Ok(StrategyParams {
        risk: RiskRules {
            risk_reward_ratio: config.get_double("risk", "risk_reward_ratio", 1.5),
            min_risk_fraction: config.get_double("risk", "min_risk_pct", 1.0) / 100.0,
        },
        gate: Gate {
            min_volume_lots: config.get_double("risk", "min_volume_lots", 0.0),
            trend_mas: parse_ma_list(config)?,
        },
    })
}

/// Builds the pipeline configuration. `today` is the as-of date unless
/// `[scan] as_of` is set.
pub fn build_scan_config(
    config: &dyn ConfigPort,
    today: NaiveDate,
) -> Result<ScanConfig, ScreenerError> {
    let strategies = parse_strategies(&config.get_string("scan", "strategies").unwrap_or_default())?;
    let params = build_params(config)?;

    let backtest = config
        .get_bool("scan", "backtest", true)
        .then(|| BacktestConfig::from_months(config.get_int("scan", "lookback_months", 6).max(0) as usize));

    let end_date = match config.get_string("scan", "as_of") {
        Some(s) => parse_as_of(&s)?,
        None => today,
    };

    // Enough calendar days to cover warm-up plus the replay window.
    let needed_bars = strategies
        .iter()
        .map(|s| s.min_bars(&params))
        .max()
        .unwrap_or(0)
        + backtest.map_or(0, |b| b.lookback_bars);
    let needed_days = (needed_bars * 7).div_ceil(5) as i64 + 14;
    let history_days = config.get_int("scan", "history_days", 400).max(needed_days);
    let start_date = end_date
        .checked_sub_days(Days::new(history_days.max(1) as u64))
        .ok_or_else(|| ScreenerError::invalid("scan", "history_days", "history reaches before the calendar"))?;

    Ok(ScanConfig {
        strategies,
        params,
        backtest,
        batch_size: config.get_int("scan", "batch_size", 20).max(0) as usize,
        throttle: Duration::from_millis(config.get_int("scan", "throttle_ms", 300).max(0) as u64),
        fetch_concurrency: config.get_int("scan", "fetch_concurrency", 4).max(0) as usize,
        start_date,
        end_date,
    })
}

pub fn build_data_port(config: &dyn ConfigPort) -> Result<CachedDataPort<CsvAdapter>, ScreenerError> {
    let path = config
        .get_string("data", "path")
        .ok_or_else(|| ScreenerError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    let ttl = config.get_int("data", "cache_ttl_secs", 300).max(0) as u64;
    Ok(CachedDataPort::new(
        CsvAdapter::new(PathBuf::from(path)),
        Duration::from_secs(ttl),
    ))
}

/// Full-market listing: the exchange listing file when configured, otherwise
/// every ticker present in the data directory.
pub fn build_universe_port(config: &dyn ConfigPort) -> Result<Box<dyn UniversePort>, ScreenerError> {
    let ttl = Duration::from_secs(config.get_int("universe", "cache_ttl_secs", 86_400).max(0) as u64);
    if let Some(listing) = config.get_string("universe", "listing") {
        let suffix = config
            .get_string("universe", "suffix")
            .unwrap_or_else(|| ".TW".to_string());
        let adapter = TickerListAdapter::new(PathBuf::from(listing), suffix);
        return Ok(Box::new(CachedUniverse::new(adapter, ttl)));
    }
    let path = config
        .get_string("data", "path")
        .ok_or_else(|| ScreenerError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    Ok(Box::new(CachedUniverse::new(CsvAdapter::new(PathBuf::from(path)), ttl)))
}

pub fn resolve_tickers(
    config: &dyn ConfigPort,
    provider: &dyn UniversePort,
) -> Result<Vec<Ticker>, ScreenerError> {
    let source: UniverseSource = config
        .get_string("universe", "source")
        .unwrap_or_else(|| "manual".to_string())
        .parse()?;
    let manual = config.get_string("universe", "tickers").unwrap_or_default();
    let limit = config.get_int("universe", "limit", 0).max(0) as usize;
    resolve_universe(source, &manual, provider, limit)
}

fn run_scan_command(
    config_path: &Path,
    overrides: Overrides,
    output: Option<&Path>,
    repeat: u32,
    interval: Duration,
) -> ExitCode {
    // Stage 1: Load config and apply command-line overrides
    info!(path = %config_path.display(), "loading config");
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = overrides.apply(&adapter);

    // Stage 2: Validate
    if let Err(e) = validate_scan_config(&config) {
        return fail(&e);
    }

    // Stage 3: Build the pipeline configuration
    let today = chrono::Local::now().date_naive();
    let scan_config = match build_scan_config(&config, today) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // Stage 4: Providers and universe
    let data_port = match build_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let universe = match build_universe_port(&config) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };

    // Stage 5: Scan rounds
    let mut session = ScanSession::new();
    for round in 1..=repeat.max(1) {
        if round > 1 {
            std::thread::sleep(interval);
            let dropped = data_port.purge();
            debug!(dropped, cached = data_port.len(), "purged expired bars");
        }
        let tickers = match resolve_tickers(&config, universe.as_ref()) {
            Ok(t) => t,
            Err(e) => return fail(&e),
        };
        info!(round, tickers = tickers.len(), "resolved universe");
        if let Err(e) = run_scan_pipeline(&data_port, &tickers, &scan_config, &mut session, output) {
            return fail(&e);
        }
    }
    ExitCode::SUCCESS
}

/// Runs one scan round, prints it and optionally exports it. Separate from
/// config loading so that any [`DataPort`] can drive it. A round in which
/// every ticker failed to fetch is an error.
pub fn run_scan_pipeline(
    data_port: &dyn DataPort,
    tickers: &[Ticker],
    scan_config: &ScanConfig,
    session: &mut ScanSession,
    output: Option<&Path>,
) -> Result<ScanReport, ScreenerError> {
    let cancel = AtomicBool::new(false);
    let mut report = run_scan(data_port, tickers, scan_config, &cancel, |p| {
        info!(
            batch = p.batch,
            batches = p.batches,
            done = p.tickers_done,
            total = p.tickers_total,
            "batch complete"
        );
    })?;
    session.mark(&mut report.results);

    print!("{}", format_report(&report, &scan_config.strategies));

    if let Some(path) = output {
        CsvExportAdapter.write(&report.results, path)?;
        info!(path = %path.display(), rows = report.results.len(), "matches written");
    }

    if report.scanned > 0 && report.failure_count() == report.scanned {
        return Err(ScreenerError::DataFetch {
            ticker: "*".into(),
            reason: format!("all {} tickers failed to fetch", report.scanned),
        });
    }
    Ok(report)
}

/// Console rendering: one table per strategy in selection order, then a
/// summary line. New matches are marked with `*`.
pub fn format_report(report: &ScanReport, strategies: &[Strategy]) -> String {
    let mut out = String::new();
    for strategy in strategies {
        out.push_str(&format!("\n== {} ({}) ==\n", strategy.label(), strategy.name()));
        let rows: Vec<_> = report.for_strategy(strategy.name()).collect();
        if rows.is_empty() {
            out.push_str("no matches\n");
            continue;
        }
        out.push_str(&format!(
            "  {:<10} {:<12} {:>10} {:>10} {:>10} {:>7} {:>8} {:>8}\n",
            "ticker", "name", "entry", "stop", "target", "trades", "win%", "avg%"
        ));
        for r in rows {
            let (trades, win, avg) = match &r.backtest {
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
                Some(BacktestSummary::NoSignals) => {
                    ("0".to_string(), "-".to_string(), "-".to_string())
                }
                Some(BacktestSummary::Trades(s)) => (
                    s.trade_count.to_string(),
                    format!("{:.1}", s.win_rate),
                    format!("{:+.2}", s.avg_return),
                ),
            };
            out.push_str(&format!(
                "{} {:<10} {:<12} {:>10.2} {:>10.2} {:>10.2} {:>7} {:>8} {:>8}\n",
                if r.is_new { "*" } else { " " },
                r.ticker,
                r.name.as_deref().unwrap_or(""),
                r.signal.entry_price,
                r.signal.stop_price,
                r.signal.target_price,
                trades,
                win,
                avg
            ));
        }
    }
    out.push_str(&format!(
        "\nscanned {} tickers: {} matches, {} failed, {} with insufficient data{}\n",
        report.scanned,
        report.results.len(),
        report.failure_count(),
        report.insufficient.len(),
        if report.cancelled { " (stopped early)" } else { "" }
    ));
    out
}

fn run_backtest_command(
    config_path: &Path,
    ticker: &str,
    strategy_name: &str,
    lookback_months: Option<u32>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let overrides = Overrides {
        tickers: Some(ticker.to_string()),
        strategies: Some(strategy_name.to_string()),
        no_backtest: false,
        lookback_months,
    };
    let config = overrides.apply(&adapter);

    if let Err(e) = validate_scan_config(&config) {
        return fail(&e);
    }
    let scan_config = match build_scan_config(&config, chrono::Local::now().date_naive()) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let data_port = match build_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let ticker = ticker.trim().to_uppercase();

    match backtest_ticker(&data_port, &ticker, &scan_config) {
        Ok(text) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Trade-by-trade replay of the first selected strategy over one ticker.
pub fn backtest_ticker(
    data_port: &dyn DataPort,
    ticker: &str,
    scan_config: &ScanConfig,
) -> Result<String, ScreenerError> {
    let strategy = scan_config
        .strategies
        .first()
        .ok_or_else(|| ScreenerError::invalid("scan", "strategies", "no strategy selected"))?;
    let bt_config = scan_config
        .backtest
        .unwrap_or_else(|| BacktestConfig::from_months(6));

    let bars = data_port.fetch_ohlcv(ticker, scan_config.start_date, scan_config.end_date)?;
    if bars.is_empty() {
        return Err(ScreenerError::NoData {
            ticker: ticker.to_string(),
        });
    }
    let minimum = strategy.min_bars(&scan_config.params);
    if bars.len() < minimum {
        return Err(ScreenerError::InsufficientData {
            ticker: ticker.to_string(),
            bars: bars.len(),
            minimum,
        });
    }

    let requests = strategy.required_indicators(&scan_config.params);
    let data = CodeData::with_indicators(ticker.to_string(), bars, &requests);
    let result = run_backtest(strategy, &data, &scan_config.params, &bt_config);

    let mut out = format!(
        "{} / {} over the last {} bars (~{} months)\n",
        ticker,
        strategy.name(),
        bt_config.lookback_bars,
        bt_config.lookback_bars / TRADING_DAYS_PER_MONTH
    );
    for trade in &result.trades {
        out.push_str(&format!(
            "  {} -> {}  {:>10.2} -> {:>10.2}  {:>+7.2}%  {}\n",
            data.ohlcv[trade.entry_index].date,
            data.ohlcv[trade.exit_index].date,
            trade.entry_price,
            trade.exit_price,
            trade.return_pct,
            trade.exit_reason
        ));
    }
    if let Some(open) = &result.open_position {
        out.push_str(&format!(
            "  {} -> open        {:>10.2}  (excluded)\n",
            data.ohlcv[open.entry_index].date, open.entry_price
        ));
    }
    match &result.summary {
        BacktestSummary::NoSignals => out.push_str("no signals in the lookback window\n"),
        BacktestSummary::Trades(s) => out.push_str(&format!(
            "{} trades, {} won, {} lost, win rate {:.1}%, avg {:+.2}%, best {:+.2}%, worst {:+.2}%\n",
            s.trade_count,
            s.trades_won,
            s.trades_lost,
            s.win_rate,
            s.avg_return,
            s.best_return,
            s.worst_return
        )),
    }
    Ok(out)
}

fn run_list_strategies() -> ExitCode {
    let params = StrategyParams::default();
    for strategy in Strategy::catalog() {
        println!(
            "{:<24} {:<36} min bars {}",
            strategy.name(),
            strategy.label(),
            strategy.min_bars(&params)
        );
    }
    ExitCode::SUCCESS
}

fn run_list_tickers(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let universe = match build_universe_port(&config) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };
    let tickers = match resolve_tickers(&config, universe.as_ref()) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };
    if tickers.is_empty() {
        warn!("universe is empty");
    }
    for ticker in &tickers {
        match &ticker.name {
            Some(name) => println!("{}\t{}", ticker.symbol, name),
            None => println!("{}", ticker.symbol),
        }
    }
    eprintln!("{} tickers", tickers.len());
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_scan_config(&config) {
        return fail(&e);
    }
    let scan_config = match build_scan_config(&config, chrono::Local::now().date_naive()) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if let Err(e) = scan_config.validate() {
        return fail(&e);
    }

    eprintln!("\nStrategies:");
    for strategy in &scan_config.strategies {
        eprintln!("  {} (min bars {})", strategy.name(), strategy.min_bars(&scan_config.params));
    }
    eprintln!("\nIndicators to compute:");
    for indicator in scan_config.indicator_requests() {
        eprintln!("  {indicator}");
    }
    eprintln!(
        "\nHistory: {} to {}",
        scan_config.start_date, scan_config.end_date
    );
    match scan_config.backtest {
        Some(bt) => eprintln!("Backtest: last {} bars", bt.lookback_bars),
        None => eprintln!("Backtest: disabled"),
    }
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
