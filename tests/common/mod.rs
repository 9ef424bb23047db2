#![allow(dead_code)]

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use slopetrader::domain::backtest::BacktestConfig;
use slopetrader::domain::clock::{MarketHours, TIMESTAMP_FORMAT};
use slopetrader::domain::error::TraderError;
use slopetrader::domain::order::{Order, OrderRequest, OrderStatus};
pub use slopetrader::domain::price::{BarRecord, PriceSample};
use slopetrader::domain::strategy::StrategyParams;
use slopetrader::ports::data_port::HistoryPort;
use slopetrader::ports::gateway_port::{Account, ClockSource, OrderGateway, QuoteSource};
use std::collections::HashMap;

pub struct MockHistoryPort {
    pub records: Vec<BarRecord>,
    pub error: Option<String>,
}

impl MockHistoryPort {
    pub fn new(records: Vec<BarRecord>) -> Self {
        Self {
            records,
            error: None,
        }
    }

    pub fn with_error(reason: &str) -> Self {
        Self {
            records: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl HistoryPort for MockHistoryPort {
    fn fetch_records(&self) -> Result<Vec<BarRecord>, TraderError> {
        match &self.error {
            Some(reason) => Err(TraderError::DataSource {
                reason: reason.clone(),
            }),
            None => Ok(self.records.clone()),
        }
    }
}

pub fn at(ts: &str) -> DateTime<Tz> {
    MarketHours::default().parse_timestamp(ts).unwrap()
}

/// A bar whose high and low sit `spread` either side of the close.
pub fn make_bar(ts: &str, close: Decimal, spread: Decimal) -> BarRecord {
    BarRecord::new(
        ts,
        &close.to_string(),
        &(close + spread).to_string(),
        &(close - spread).to_string(),
        &close.to_string(),
    )
}

/// Consecutive one-minute bars starting at `start`.
pub fn minute_bars(start: &str, closes: &[Decimal], spread: Decimal) -> Vec<BarRecord> {
    let first = at(start);
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let t = first + Duration::minutes(i as i64);
            make_bar(&t.format(TIMESTAMP_FORMAT).to_string(), *close, spread)
        })
        .collect()
}

pub fn sample_config(start: &str) -> BacktestConfig {
    let mut config = BacktestConfig::new(at(start), MarketHours::default());
    config.fill_probability = 1.0;
    config.seed = Some(42);
    config
}

pub fn sample_params(min_slope: Decimal, max_concurrent: usize) -> StrategyParams {
    let mut params = StrategyParams::new("SPY", Decimal::from(10), max_concurrent);
    params.min_slope_required_to_buy = min_slope;
    params.time_step = Duration::seconds(60);
    params
}

/// A broker stand-in with scripted quotes. Orders fill at `fill_price` on
/// the first refresh and cancels take effect immediately, the way a live
/// venue would behave.
pub struct ScriptedGateway {
    pub now: DateTime<Tz>,
    pub bars: Vec<PriceSample>,
    pub cash: Decimal,
    pub shares: Decimal,
    pub fill_price: Option<Decimal>,
    pub orders: HashMap<String, Order>,
    pub canceled: Vec<String>,
    pub closed_out: usize,
    next_id: u64,
}

impl ScriptedGateway {
    pub fn new(now: DateTime<Tz>, bars: Vec<PriceSample>, cash: Decimal) -> Self {
        Self {
            now,
            bars,
            cash,
            shares: Decimal::ZERO,
            fill_price: None,
            orders: HashMap::new(),
            canceled: Vec::new(),
            closed_out: 0,
            next_id: 0,
        }
    }

    pub fn filling_at(mut self, price: Decimal) -> Self {
        self.fill_price = Some(price);
        self
    }
}

impl ClockSource for ScriptedGateway {
    fn now(&self) -> DateTime<Tz> {
        self.now
    }
}

impl QuoteSource for ScriptedGateway {
    fn recent_bars(&self, _symbol: &str, count: usize) -> Result<Vec<PriceSample>, TraderError> {
        let skip = self.bars.len().saturating_sub(count);
        Ok(self.bars[skip..].to_vec())
    }

    fn latest_quote(&self, _symbol: &str) -> Result<PriceSample, TraderError> {
        self.bars.last().copied().ok_or_else(|| TraderError::NoData {
            timestamp: self.now.format(TIMESTAMP_FORMAT).to_string(),
        })
    }
}

impl OrderGateway for ScriptedGateway {
    fn place_order(&mut self, request: &OrderRequest) -> Result<Order, TraderError> {
        self.next_id += 1;
        let order = Order::from_request(format!("live-{}", self.next_id), request, self.now);
        self.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    fn cancel_order(&mut self, order_id: &str) -> Result<(), TraderError> {
        let order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| TraderError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        order.status = OrderStatus::Canceled;
        self.canceled.push(order_id.to_string());
        Ok(())
    }

    fn get_order(&mut self, order_id: &str) -> Result<Order, TraderError> {
        let order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| TraderError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        if let (true, Some(price)) = (order.status.is_working(), self.fill_price) {
            order.mark_filled(price, order.quantity);
        }
        Ok(order.clone())
    }

    fn account(&self) -> Result<Account, TraderError> {
        Ok(Account {
            cash: self.cash,
            shares_held: self.shares,
        })
    }

    fn close_out(&mut self) -> Result<(), TraderError> {
        self.closed_out += 1;
        self.orders.clear();
        Ok(())
    }
}
