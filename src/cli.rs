//! CLI definition and dispatch.

use chrono::Duration;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::backtest::{Backtest, BacktestConfig, BacktestResult};
use crate::domain::clock::{MarketHours, TIMESTAMP_FORMAT};
use crate::domain::config_validation::{
    decimal_value, market_hours, u64_value, validate_backtest_config, validate_market_config,
    validate_strategy_config,
};
use crate::domain::error::TraderError;
use crate::domain::history::{DEFAULT_MAX_ITERATIONS, HistoricalSeries};
use crate::domain::ledger::profit_loss_percent;
use crate::domain::order::BracketOffsets;
use crate::domain::price::BarRecord;
use crate::domain::strategy::StrategyParams;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::HistoryPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "slopetrader", about = "Minute-bar backtester for a slope-following strategy")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Historical data file, overriding [backtest] data_file
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Start time (YYYY-MM-DD HH:MM:SS), overriding [backtest] start_time
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        print_day_details: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the range and prices of the loaded historical series
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct BacktestOverrides {
    pub data: Option<PathBuf>,
    pub start: Option<String>,
    pub seed: Option<u64>,
    pub print_day_details: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            start,
            seed,
            print_day_details,
            output,
        } => {
            let overrides = BacktestOverrides {
                data,
                start,
                seed,
                print_day_details,
            };
            run_backtest(&config, &overrides, output.as_deref())
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, data } => run_info(&config, data.as_deref()),
    }
}

fn exit_with(err: &TraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| exit_with(&e))
}

fn run_backtest(config_path: &Path, overrides: &BacktestOverrides, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = match run_backtest_pipeline(&adapter, overrides) {
        Ok(r) => r,
        Err(e) => return exit_with(&e),
    };

    let output = output.map(|p| p.display().to_string());
    match TextReportAdapter::new().write(&result, output.as_deref()) {
        Ok(()) => {
            if let Some(path) = output {
                eprintln!("Report written to {path}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => exit_with(&e),
    }
}

/// Validate, load data and run. Nothing is reported unless the whole run
/// succeeds.
pub fn run_backtest_pipeline(
    adapter: &dyn ConfigPort,
    overrides: &BacktestOverrides,
) -> Result<BacktestResult, TraderError> {
    validate_all(adapter)?;
    let hours = market_hours(adapter)?;
    let params = build_strategy_params(adapter)?;
    let config = build_backtest_config(adapter, hours, overrides)?;

    let records = load_records(adapter, overrides.data.as_deref())?;
    let backtest = Backtest::from_records(&records, config, params)?;
    eprintln!(
        "Loaded {} samples, {} to {}",
        backtest.series().len(),
        backtest.series().start_time().format(TIMESTAMP_FORMAT),
        backtest.series().end_time().format(TIMESTAMP_FORMAT)
    );
    eprintln!("Fill seed: {}", backtest.seed());
    backtest.run()
}

fn validate_all(adapter: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_market_config(adapter)?;
    validate_backtest_config(adapter)?;
    validate_strategy_config(adapter)?;
    Ok(())
}

pub fn resolve_data_file(
    adapter: &dyn ConfigPort,
    data_override: Option<&Path>,
) -> Result<PathBuf, TraderError> {
    match data_override {
        Some(path) => Ok(path.to_path_buf()),
        None => adapter
            .get_string("backtest", "data_file")
            .map(PathBuf::from)
            .ok_or_else(|| TraderError::config_missing("backtest", "data_file")),
    }
}

fn load_records(
    adapter: &dyn ConfigPort,
    data_override: Option<&Path>,
) -> Result<Vec<BarRecord>, TraderError> {
    let path = resolve_data_file(adapter, data_override)?;
    eprintln!("Reading historical data from {}", path.display());
    CsvAdapter::new(path)
        .with_headers(adapter.get_bool("backtest", "data_has_headers", false))
        .fetch_records()
}

fn seconds(adapter: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Duration {
    Duration::seconds(adapter.get_int(section, key, default))
}

fn minutes(adapter: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Duration {
    Duration::minutes(adapter.get_int(section, key, default))
}

fn positive_usize(adapter: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<usize, TraderError> {
    let value = adapter.get_int(section, key, default);
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| TraderError::config_invalid(section, key, format!("{key} must be positive")))
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    hours: MarketHours,
    overrides: &BacktestOverrides,
) -> Result<BacktestConfig, TraderError> {
    let start_str = match &overrides.start {
        Some(s) => s.clone(),
        None => adapter
            .get_string("backtest", "start_time")
            .ok_or_else(|| TraderError::config_missing("backtest", "start_time"))?,
    };
    let start = hours.parse_timestamp(&start_str).map_err(|_| {
        TraderError::config_invalid(
            "backtest",
            "start_time",
            "invalid timestamp (expected YYYY-MM-DD HH:MM:SS)",
        )
    })?;

    let mut config = BacktestConfig::new(start, hours);
    if let Some(cash) = decimal_value(adapter, "backtest", "starting_cash")? {
        config.starting_cash = cash;
    }
    config.data_step = seconds(adapter, "backtest", "data_step_seconds", 60);
    config.fill_probability =
        adapter.get_double("backtest", "fill_probability", config.fill_probability);
    config.seed = match overrides.seed {
        Some(seed) => Some(seed),
        None => u64_value(adapter, "backtest", "seed")?,
    };
    config.print_day_details =
        overrides.print_day_details || adapter.get_bool("backtest", "print_day_details", false);
    config.max_series_iterations = positive_usize(
        adapter,
        "backtest",
        "max_series_iterations",
        DEFAULT_MAX_ITERATIONS as i64,
    )?;
    Ok(config)
}

pub fn build_strategy_params(adapter: &dyn ConfigPort) -> Result<StrategyParams, TraderError> {
    let symbol = adapter
        .get_string("strategy", "symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TraderError::config_missing("strategy", "symbol"))?;
    let purchase_quantity = decimal_value(adapter, "strategy", "purchase_quantity")?
        .ok_or_else(|| TraderError::config_missing("strategy", "purchase_quantity"))?;
    if !adapter.has_key("strategy", "max_concurrent_purchases") {
        return Err(TraderError::config_missing(
            "strategy",
            "max_concurrent_purchases",
        ));
    }
    let max_concurrent = positive_usize(adapter, "strategy", "max_concurrent_purchases", 0)?;

    let mut params = StrategyParams::new(&symbol, purchase_quantity, max_concurrent);
    params.num_historical_bars = positive_usize(adapter, "strategy", "num_historical_bars", 3)?;
    if let Some(slope) = decimal_value(adapter, "strategy", "min_slope_required_to_buy")? {
        params.min_slope_required_to_buy = slope;
    }
    params.all_sequential_increases_required =
        adapter.get_bool("strategy", "all_sequential_increases_required", false);
    params.time_step = seconds(adapter, "strategy", "time_step_seconds", 30);
    params.liquidate_before_close =
        minutes(adapter, "strategy", "liquidate_before_close_minutes", 60);
    params.stale_buy_order_after = minutes(adapter, "strategy", "stale_buy_order_minutes", 5);

    let defaults = BracketOffsets::default();
    params.bracket = BracketOffsets {
        take_profit_pct: decimal_value(adapter, "strategy", "take_profit_pct")?
            .unwrap_or(defaults.take_profit_pct),
        stop_loss_pct: decimal_value(adapter, "strategy", "stop_loss_pct")?
            .unwrap_or(defaults.stop_loss_pct),
        stop_limit_pct: decimal_value(adapter, "strategy", "stop_limit_pct")?
            .unwrap_or(defaults.stop_limit_pct),
    };
    Ok(params)
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let checked = validate_all(&adapter).and_then(|()| {
        let hours = market_hours(&adapter)?;
        let params = build_strategy_params(&adapter)?;
        let config = build_backtest_config(&adapter, hours, &BacktestOverrides::default())?;
        resolve_data_file(&adapter, None)?;
        Ok((params, config))
    });
    let (params, config) = match checked {
        Ok(v) => v,
        Err(e) => return exit_with(&e),
    };

    eprintln!("\nStrategy:");
    eprintln!("  Symbol:             {}", params.symbol);
    eprintln!("  Purchase quantity:  {}", params.purchase_quantity);
    eprintln!("  Max concurrent:     {}", params.max_concurrent_purchases);
    eprintln!("  Historical bars:    {}", params.num_historical_bars);
    eprintln!("  Min slope:          {}", params.min_slope_required_to_buy);
    eprintln!(
        "  Bracket:            +{}% / -{}% / -{}%",
        params.bracket.take_profit_pct, params.bracket.stop_loss_pct, params.bracket.stop_limit_pct
    );
    eprintln!("\nBacktest:");
    eprintln!("  Start:              {}", config.start.format(TIMESTAMP_FORMAT));
    eprintln!("  Starting cash:      {}", config.starting_cash);
    eprintln!("  Fill probability:   {}", config.fill_probability);
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

/// Series metadata shown by `info`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesInfo {
    pub symbol: String,
    pub samples: usize,
    pub start: String,
    pub end: String,
    pub start_price: Decimal,
    pub end_price: Decimal,
}

impl SeriesInfo {
    pub fn symbol_profit_loss_percent(&self) -> Decimal {
        profit_loss_percent(self.start_price, self.end_price)
    }
}

pub fn series_info(
    adapter: &dyn ConfigPort,
    data_override: Option<&Path>,
) -> Result<SeriesInfo, TraderError> {
    validate_market_config(adapter)?;
    validate_backtest_config(adapter)?;
    let hours = market_hours(adapter)?;
    let config = build_backtest_config(adapter, hours, &BacktestOverrides::default())?;
    let records = load_records(adapter, data_override)?;
    let series = HistoricalSeries::load(&records, &config.series_options())?;

    Ok(SeriesInfo {
        symbol: adapter
            .get_string("strategy", "symbol")
            .unwrap_or_else(|| "-".to_string()),
        samples: series.len(),
        start: series.start_time().format(TIMESTAMP_FORMAT).to_string(),
        end: series.end_time().format(TIMESTAMP_FORMAT).to_string(),
        start_price: series.symbol_start_price(),
        end_price: series.symbol_end_price(),
    })
}

fn run_info(config_path: &Path, data_override: Option<&Path>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let info = match series_info(&adapter, data_override) {
        Ok(i) => i,
        Err(e) => return exit_with(&e),
    };

    println!("Symbol:              {}", info.symbol);
    println!("Samples:             {}", info.samples);
    println!("Start:               {}", info.start);
    println!("End:                 {}", info.end);
    println!("Symbol start price:  {}", info.start_price);
    println!("Symbol end price:    {}", info.end_price);
    println!(
        "Symbol Profit/Loss:  {}%",
        info.symbol_profit_loss_percent().round_dp(3)
    );
    ExitCode::SUCCESS
}
