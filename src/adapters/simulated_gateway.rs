//! Backtest gateway: replays a historical series behind the trading traits.
//!
//! Orders are resolved lazily. `place_order` only records the order; fills
//! are attempted when the engine refreshes it through `get_order`, against
//! the sample for the current simulated minute.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::clock::SimulatedClock;
use crate::domain::error::TraderError;
use crate::domain::fill::{FillOutcome, FillSimulator};
use crate::domain::history::HistoricalSeries;
use crate::domain::ledger::PortfolioLedger;
use crate::domain::order::{Order, OrderRequest, OrderSide};
use crate::domain::price::PriceSample;
use crate::ports::gateway_port::{Account, ClockSource, OrderGateway, QuoteSource};

pub struct SimulatedGateway {
    symbol: String,
    series: HistoricalSeries,
    clock: SimulatedClock,
    ledger: PortfolioLedger,
    fills: FillSimulator,
    orders: HashMap<String, Order>,
    /// Orders placed since the last close-out. Also the last id handed out.
    order_counter: u64,
}

impl SimulatedGateway {
    pub fn new(
        symbol: &str,
        series: HistoricalSeries,
        clock: SimulatedClock,
        ledger: PortfolioLedger,
        fills: FillSimulator,
    ) -> Self {
        SimulatedGateway {
            symbol: symbol.to_string(),
            series,
            clock,
            ledger,
            fills,
            orders: HashMap::new(),
            order_counter: 0,
        }
    }

    pub fn advance_clock(&mut self) {
        self.clock.advance();
    }

    pub fn advance_clock_by(&mut self, delta: Duration) {
        self.clock.advance_by(delta);
    }

    pub fn clock(&self) -> &SimulatedClock {
        &self.clock
    }

    pub fn series(&self) -> &HistoricalSeries {
        &self.series
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut PortfolioLedger {
        &mut self.ledger
    }

    pub fn orders_created_today(&self) -> u64 {
        self.order_counter
    }

    /// Sell any remaining shares at the last sample in the series.
    pub fn liquidate_at_series_end(&mut self) -> Result<Decimal, TraderError> {
        if self.ledger.shares_held().is_zero() {
            return Ok(Decimal::ZERO);
        }
        let sample = self.series.lookup(self.series.end_time())?;
        let proceeds = self.ledger.liquidate(&sample);
        debug!(%proceeds, "liquidated remaining shares at series end");
        Ok(proceeds)
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), TraderError> {
        if symbol == self.symbol {
            Ok(())
        } else {
            Err(TraderError::DataSource {
                reason: format!("no history for {symbol}, series holds {}", self.symbol),
            })
        }
    }

    fn check_request(&self, request: &OrderRequest, order_id: &str) -> Result<(), TraderError> {
        let invalid = |reason: &str| TraderError::InvalidOrderConfig {
            order_id: order_id.to_string(),
            reason: reason.to_string(),
        };
        if request.quantity <= Decimal::ZERO {
            return Err(invalid("quantity must be positive"));
        }
        if request.side == OrderSide::Sell && request.bracket.is_none() {
            return Err(invalid("sell order needs take-profit and stop-loss prices"));
        }
        Ok(())
    }
}

impl ClockSource for SimulatedGateway {
    fn now(&self) -> DateTime<Tz> {
        self.clock.now()
    }
}

impl QuoteSource for SimulatedGateway {
    fn recent_bars(&self, symbol: &str, count: usize) -> Result<Vec<PriceSample>, TraderError> {
        self.check_symbol(symbol)?;
        Ok(self.series.recent_samples(self.clock.now(), count))
    }

    fn latest_quote(&self, symbol: &str) -> Result<PriceSample, TraderError> {
        self.check_symbol(symbol)?;
        self.series.lookup(self.clock.now())
    }
}

impl OrderGateway for SimulatedGateway {
    fn place_order(&mut self, request: &OrderRequest) -> Result<Order, TraderError> {
        self.check_symbol(&request.symbol)?;
        let id = (self.order_counter + 1).to_string();
        self.check_request(request, &id)?;
        self.order_counter += 1;

        let order = Order::from_request(id.clone(), request, self.clock.now());
        debug!(id = %order.id, side = %order.side, qty = %order.quantity, "order placed");
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    /// Cancels are not simulated: the order keeps working until it fills or
    /// the day is closed out.
    fn cancel_order(&mut self, order_id: &str) -> Result<(), TraderError> {
        if !self.orders.contains_key(order_id) {
            return Err(TraderError::OrderNotFound {
                order_id: order_id.to_string(),
            });
        }
        debug!(order_id, "cancel requested, not simulated");
        Ok(())
    }

    fn get_order(&mut self, order_id: &str) -> Result<Order, TraderError> {
        let now = self.clock.now();
        let order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| TraderError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.status.is_working() {
            let sample = self.series.lookup(now)?;
            if let FillOutcome::Filled { price, quantity } =
                self.fills.attempt_fill(order, &sample)?
            {
                self.ledger.apply_fill(order.side, price, quantity);
                debug!(order_id, side = %order.side, %price, %quantity, "order filled");
            }
        }
        Ok(order.clone())
    }

    fn account(&self) -> Result<Account, TraderError> {
        Ok(Account {
            cash: self.ledger.cash(),
            shares_held: self.ledger.shares_held(),
        })
    }

    /// Liquidate at the current minute's low, drop the day's orders and
    /// restart order ids.
    fn close_out(&mut self) -> Result<(), TraderError> {
        if !self.ledger.shares_held().is_zero() {
            let sample = self.series.lookup(self.clock.now())?;
            let proceeds = self.ledger.liquidate(&sample);
            debug!(%proceeds, "liquidated at close-out");
        }
        self.orders.clear();
        self.order_counter = 0;
        Ok(())
    }
}
