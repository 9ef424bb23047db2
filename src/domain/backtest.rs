//! Backtest run context and tick loop.
//!
//! Each tick advances the simulated clock, then either closes out the day
//! (inside the pre-close window), idles (market closed), or runs one strategy
//! step followed by an order refresh. Fills therefore land on the same tick
//! as the decision that placed them.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::info;

use super::clock::{MarketHours, SimulatedClock, TIMESTAMP_FORMAT};
use super::error::TraderError;
use super::fill::{DEFAULT_FILL_PROBABILITY, FillSimulator};
use super::history::{DEFAULT_MAX_ITERATIONS, HistoricalSeries, SeriesOptions};
use super::ledger::{DayCash, PortfolioLedger, profit_loss_percent};
use super::price::BarRecord;
use super::strategy::{StrategyEngine, StrategyParams};
use crate::adapters::memory_store::InMemoryPurchaseStore;
use crate::adapters::simulated_gateway::SimulatedGateway;
use crate::ports::gateway_port::{ClockSource, QuoteSource};

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start: DateTime<Tz>,
    pub hours: MarketHours,
    pub starting_cash: Decimal,
    /// Spacing of records in the historical file.
    pub data_step: Duration,
    pub fill_probability: f64,
    pub seed: Option<u64>,
    pub print_day_details: bool,
    pub max_series_iterations: usize,
}

impl BacktestConfig {
    pub fn new(start: DateTime<Tz>, hours: MarketHours) -> Self {
        BacktestConfig {
            start,
            hours,
            starting_cash: Decimal::new(100_000, 0),
            data_step: Duration::seconds(60),
            fill_probability: DEFAULT_FILL_PROBABILITY,
            seed: None,
            print_day_details: false,
            max_series_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn series_options(&self) -> SeriesOptions {
        SeriesOptions {
            start: self.start,
            step: self.data_step,
            hours: self.hours,
            max_iterations: self.max_series_iterations,
        }
    }
}

/// One trading day, from the first open tick to the close-out.
#[derive(Debug, Clone, PartialEq)]
pub struct DayReport {
    pub time: DateTime<Tz>,
    pub orders_created: u64,
    pub cash: DayCash,
    pub symbol_start: Decimal,
    pub symbol_end: Decimal,
}

impl DayReport {
    pub fn profit_loss_percent(&self) -> Decimal {
        self.cash.profit_loss_percent()
    }

    pub fn symbol_profit_loss_percent(&self) -> Decimal {
        profit_loss_percent(self.symbol_start, self.symbol_end)
    }

    pub fn algorithm_benefit(&self) -> Decimal {
        self.profit_loss_percent() - self.symbol_profit_loss_percent()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub seed: u64,
    pub starting_cash: Decimal,
    pub ending_cash: Decimal,
    pub symbol_start_price: Decimal,
    pub symbol_end_price: Decimal,
    pub series_start: DateTime<Tz>,
    pub series_end: DateTime<Tz>,
    pub days: Vec<DayReport>,
    pub print_day_details: bool,
}

impl BacktestResult {
    pub fn profit_loss_percent(&self) -> Decimal {
        profit_loss_percent(self.starting_cash, self.ending_cash)
    }

    /// Buy-and-hold return of the symbol over the loaded series.
    pub fn symbol_profit_loss_percent(&self) -> Decimal {
        profit_loss_percent(self.symbol_start_price, self.symbol_end_price)
    }

    pub fn algorithm_benefit(&self) -> Decimal {
        self.profit_loss_percent() - self.symbol_profit_loss_percent()
    }
}

pub struct Backtest {
    config: BacktestConfig,
    gateway: SimulatedGateway,
    engine: StrategyEngine,
    seed: u64,
    day_symbol_start: Option<Decimal>,
    days: Vec<DayReport>,
}

impl Backtest {
    pub fn new(series: HistoricalSeries, config: BacktestConfig, params: StrategyParams) -> Self {
        let seed = config.seed.unwrap_or_else(|| {
            let seed = rand::random();
            info!(seed, "no seed configured, using a random one");
            seed
        });
        let clock = SimulatedClock::new(config.start, params.time_step, config.hours);
        let gateway = SimulatedGateway::new(
            &params.symbol,
            series,
            clock,
            PortfolioLedger::new(config.starting_cash),
            FillSimulator::new(config.fill_probability, seed),
        );
        let engine = StrategyEngine::new(params, Box::new(InMemoryPurchaseStore::new()));

        Backtest {
            config,
            gateway,
            engine,
            seed,
            day_symbol_start: None,
            days: Vec::new(),
        }
    }

    /// Build the series from raw records, then the run context.
    pub fn from_records(
        records: &[BarRecord],
        config: BacktestConfig,
        params: StrategyParams,
    ) -> Result<Self, TraderError> {
        let series = HistoricalSeries::load(records, &config.series_options())?;
        Ok(Self::new(series, config, params))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn series(&self) -> &HistoricalSeries {
        self.gateway.series()
    }

    /// Run until the clock passes the last sample. Any error aborts the run
    /// and no partial result is returned.
    pub fn run(mut self) -> Result<BacktestResult, TraderError> {
        let series_start = self.gateway.series().start_time();
        let series_end = self.gateway.series().end_time();
        let window = self.engine.params().liquidate_before_close;
        let symbol = self.engine.params().symbol.clone();

        info!(
            start = %self.config.start.format(TIMESTAMP_FORMAT),
            end = %series_end.format(TIMESTAMP_FORMAT),
            cash = %self.config.starting_cash,
            "backtest starting"
        );

        loop {
            self.gateway.advance_clock();
            let now = self.gateway.now();
            if now > series_end {
                break;
            }

            let until_close = self.gateway.clock().time_until_close();
            if until_close.is_some_and(|left| left > Duration::zero() && left < window) {
                self.end_day(now)?;
                self.gateway.advance_clock_by(window);
                continue;
            }
            if !self.gateway.clock().is_open() || now < series_start {
                continue;
            }

            if self.day_symbol_start.is_none() {
                self.day_symbol_start = Some(self.gateway.latest_quote(&symbol)?.close);
            }
            self.engine.run(&mut self.gateway, now)?;
            self.engine.update_orders(&mut self.gateway)?;
        }

        self.finish(series_end)
    }

    fn end_day(&mut self, now: DateTime<Tz>) -> Result<(), TraderError> {
        let symbol_end = match self.day_symbol_start {
            Some(_) => Some(self.gateway.latest_quote(&self.engine.params().symbol)?.close),
            None => None,
        };
        let orders_created = self.gateway.orders_created_today();

        self.engine.close_out_trading(&mut self.gateway)?;
        let cash = self.gateway.ledger().snapshot_day_end();
        self.gateway.ledger_mut().snapshot_day_start();

        if let (Some(symbol_start), Some(symbol_end)) = (self.day_symbol_start.take(), symbol_end) {
            let day = DayReport {
                time: now,
                orders_created,
                cash,
                symbol_start,
                symbol_end,
            };
            info!(
                time = %now.format(TIMESTAMP_FORMAT),
                orders = orders_created,
                cash = %cash.end,
                pnl = %day.profit_loss_percent().round_dp(3),
                "day closed"
            );
            self.days.push(day);
        }
        Ok(())
    }

    /// Liquidate what is still held and record a trailing partial day.
    fn finish(mut self, series_end: DateTime<Tz>) -> Result<BacktestResult, TraderError> {
        let orders_created = self.gateway.orders_created_today();
        self.gateway.liquidate_at_series_end()?;

        if let Some(symbol_start) = self.day_symbol_start.take() {
            self.days.push(DayReport {
                time: series_end,
                orders_created,
                cash: self.gateway.ledger().snapshot_day_end(),
                symbol_start,
                symbol_end: self.gateway.series().symbol_end_price(),
            });
        }

        let series = self.gateway.series();
        let result = BacktestResult {
            symbol: self.engine.params().symbol.clone(),
            seed: self.seed,
            starting_cash: self.gateway.ledger().cash_at_session_start(),
            ending_cash: self.gateway.ledger().cash(),
            symbol_start_price: series.symbol_start_price(),
            symbol_end_price: series.symbol_end_price(),
            series_start: series.start_time(),
            series_end,
            days: self.days,
            print_day_details: self.config.print_day_details,
        };
        info!(
            ending_cash = %result.ending_cash,
            pnl = %result.profit_loss_percent().round_dp(3),
            days = result.days.len(),
            "backtest finished"
        );
        Ok(result)
    }
}
