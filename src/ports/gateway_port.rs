//! Brokerage seam shared by backtests and live trading.
//!
//! The strategy engine only ever talks to a [`TradingGateway`]. The backtest
//! implementation replays a historical series; a live implementation would
//! forward the same calls to a broker API.

use chrono::DateTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::domain::error::TraderError;
use crate::domain::order::{Order, OrderRequest};
use crate::domain::price::PriceSample;

/// Account balances as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub cash: Decimal,
    pub shares_held: Decimal,
}

pub trait ClockSource {
    fn now(&self) -> DateTime<Tz>;
}

pub trait QuoteSource {
    /// Up to `count` most recent one-minute samples, oldest first. Fewer are
    /// returned when history is missing; callers must check the length.
    fn recent_bars(&self, symbol: &str, count: usize) -> Result<Vec<PriceSample>, TraderError>;

    /// The sample for the current minute.
    fn latest_quote(&self, symbol: &str) -> Result<PriceSample, TraderError>;
}

pub trait OrderGateway {
    fn place_order(&mut self, request: &OrderRequest) -> Result<Order, TraderError>;

    fn cancel_order(&mut self, order_id: &str) -> Result<(), TraderError>;

    /// Current state of an order. A simulated gateway may resolve fills here.
    fn get_order(&mut self, order_id: &str) -> Result<Order, TraderError>;

    fn account(&self) -> Result<Account, TraderError>;

    /// End-of-day flatten: sell any held shares and reset per-day state.
    fn close_out(&mut self) -> Result<(), TraderError>;
}

pub trait TradingGateway: OrderGateway + QuoteSource + ClockSource {}

impl<T: OrderGateway + QuoteSource + ClockSource> TradingGateway for T {}
