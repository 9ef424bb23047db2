//! Slope-following strategy: when to buy, how to exit, and order upkeep.
//!
//! The engine holds the purchases for the current day and talks to the
//! market only through a [`TradingGateway`], so the same code drives both
//! backtests and a live broker.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::error::TraderError;
use super::order::{BracketOffsets, OrderRequest};
use super::purchase::Purchase;
use super::signal::{all_sequential_increases, regression_slope};
use crate::ports::gateway_port::TradingGateway;
use crate::ports::purchase_store_port::PurchaseStore;

/// Cash needed for a buy is the notional times this factor.
pub const CASH_BUFFER: Decimal = Decimal::from_parts(12, 0, 0, false, 1);

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub symbol: String,
    pub purchase_quantity: Decimal,
    pub max_concurrent_purchases: usize,
    pub num_historical_bars: usize,
    pub min_slope_required_to_buy: Decimal,
    pub all_sequential_increases_required: bool,
    pub time_step: Duration,
    pub liquidate_before_close: Duration,
    pub stale_buy_order_after: Duration,
    pub bracket: BracketOffsets,
}

impl StrategyParams {
    /// Defaults for everything except what must be chosen per run.
    pub fn new(symbol: &str, purchase_quantity: Decimal, max_concurrent_purchases: usize) -> Self {
        StrategyParams {
            symbol: symbol.to_string(),
            purchase_quantity,
            max_concurrent_purchases,
            num_historical_bars: 3,
            min_slope_required_to_buy: Decimal::new(13, 1),
            all_sequential_increases_required: false,
            time_step: Duration::seconds(30),
            liquidate_before_close: Duration::minutes(60),
            stale_buy_order_after: Duration::minutes(5),
            bracket: BracketOffsets::default(),
        }
    }
}

/// Outcome of the buy checks for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyDecision {
    Buy,
    AllowancesUsed { open: usize },
    InsufficientHistory { have: usize, need: usize },
    InsufficientCash { have: Decimal, need: Decimal },
    SlopeTooShallow { slope: Decimal },
    NotSequential,
}

pub struct StrategyEngine {
    params: StrategyParams,
    purchases: Vec<Purchase>,
    store: Box<dyn PurchaseStore>,
}

impl StrategyEngine {
    pub fn new(params: StrategyParams, store: Box<dyn PurchaseStore>) -> Self {
        StrategyEngine {
            params,
            purchases: Vec::new(),
            store,
        }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Purchases made since the last close-out.
    pub fn purchases(&self) -> &[Purchase] {
        &self.purchases
    }

    pub fn store(&self) -> &dyn PurchaseStore {
        self.store.as_ref()
    }

    /// Purchases counting against `max_concurrent_purchases`.
    pub fn open_purchases(&self) -> usize {
        self.purchases.iter().filter(|p| p.is_open()).count()
    }

    /// One decision step: cancel stale buys, maybe buy, place pending sells.
    pub fn run(&mut self, gateway: &mut dyn TradingGateway, now: DateTime<Tz>) -> Result<(), TraderError> {
        self.cancel_outdated_orders(gateway, now)?;
        self.buy(gateway, now)?;
        self.sell(gateway)?;
        Ok(())
    }

    /// Ask the gateway to cancel buys that have been working too long.
    pub fn cancel_outdated_orders(
        &mut self,
        gateway: &mut dyn TradingGateway,
        now: DateTime<Tz>,
    ) -> Result<(), TraderError> {
        for p in self.purchases.iter().filter(|p| p.in_progress_buy_order()) {
            if now - p.buy_order.created_at > self.params.stale_buy_order_after {
                debug!(order_id = %p.buy_order.id, "canceling stale buy order");
                gateway.cancel_order(&p.buy_order.id)?;
            }
        }
        Ok(())
    }

    /// Place a market buy if every check passes. Returns the decision taken.
    pub fn buy(
        &mut self,
        gateway: &mut dyn TradingGateway,
        now: DateTime<Tz>,
    ) -> Result<BuyDecision, TraderError> {
        let decision = self.buy_decision(gateway)?;
        match &decision {
            BuyDecision::Buy => self.place_buy_order(gateway)?,
            BuyDecision::AllowancesUsed { open } => {
                debug!(open, at = %now, "allowable purchases used")
            }
            other => debug!(decision = ?other, at = %now, "no buy"),
        }
        Ok(decision)
    }

    /// Evaluate, in order: concurrency cap, history length, cash, slope and
    /// (optionally) strictly increasing closes.
    pub fn buy_decision(&self, gateway: &dyn TradingGateway) -> Result<BuyDecision, TraderError> {
        let open = self.open_purchases();
        if open >= self.params.max_concurrent_purchases {
            return Ok(BuyDecision::AllowancesUsed { open });
        }

        let need = self.params.num_historical_bars;
        let bars = gateway.recent_bars(&self.params.symbol, need)?;
        if bars.len() < need {
            return Ok(BuyDecision::InsufficientHistory {
                have: bars.len(),
                need,
            });
        }

        let quote = gateway.latest_quote(&self.params.symbol)?;
        let needed_cash = quote.high * self.params.purchase_quantity * CASH_BUFFER;
        let cash = gateway.account()?.cash;
        if cash < needed_cash {
            return Ok(BuyDecision::InsufficientCash {
                have: cash,
                need: needed_cash,
            });
        }

        let closes: Vec<Decimal> = bars.iter().map(|b| b.close).collect();
        let slope = regression_slope(&closes).unwrap_or(Decimal::ZERO);
        if slope < self.params.min_slope_required_to_buy {
            return Ok(BuyDecision::SlopeTooShallow { slope });
        }

        if self.params.all_sequential_increases_required && !all_sequential_increases(&closes) {
            return Ok(BuyDecision::NotSequential);
        }

        Ok(BuyDecision::Buy)
    }

    fn place_buy_order(&mut self, gateway: &mut dyn TradingGateway) -> Result<(), TraderError> {
        let request = OrderRequest::market_buy(&self.params.symbol, self.params.purchase_quantity);
        let order = gateway.place_order(&request)?;
        info!(order_id = %order.id, qty = %order.quantity, "buy order placed");
        let purchase = self.store.insert(Purchase::new(order))?;
        self.purchases.push(purchase);
        Ok(())
    }

    /// Place an OCO exit for every filled buy that has no working sell.
    pub fn sell(&mut self, gateway: &mut dyn TradingGateway) -> Result<(), TraderError> {
        for idx in 0..self.purchases.len() {
            let p = &self.purchases[idx];
            if p.buy_filled() && p.not_selling() {
                self.place_sell_order(idx, gateway)?;
            }
        }
        Ok(())
    }

    fn place_sell_order(
        &mut self,
        idx: usize,
        gateway: &mut dyn TradingGateway,
    ) -> Result<(), TraderError> {
        let purchase = &mut self.purchases[idx];
        let base = match purchase.buy_filled_avg_price() {
            Some(price) if !price.is_zero() => price,
            _ => {
                warn!(order_id = %purchase.buy_order.id, "filled buy has no average price, not selling");
                return Ok(());
            }
        };

        let bracket = self.params.bracket.bracket_for(base);
        let request = OrderRequest::oco_sell(&self.params.symbol, purchase.buy_order.filled_qty, bracket);
        let order = gateway.place_order(&request)?;
        info!(
            order_id = %order.id,
            take_profit = %bracket.take_profit,
            stop = %bracket.stop_price,
            "sell order placed"
        );
        purchase.sell_order = Some(order);
        self.store.update(purchase)?;
        Ok(())
    }

    /// Refresh every order that can still change and persist the result.
    pub fn update_orders(&mut self, gateway: &mut dyn TradingGateway) -> Result<(), TraderError> {
        for purchase in self.purchases.iter_mut() {
            let mut changed = false;
            if purchase.in_progress_buy_order() {
                purchase.buy_order = gateway.get_order(&purchase.buy_order.id)?;
                changed = true;
            }
            if let Some(sell) = purchase.sell_order.as_ref().filter(|o| !o.status.is_completed()) {
                let refreshed = gateway.get_order(&sell.id)?;
                purchase.sell_order = Some(refreshed);
                changed = true;
            }
            if changed {
                self.store.update(purchase)?;
            }
        }
        Ok(())
    }

    /// Flatten through the gateway and forget the day's purchases.
    pub fn close_out_trading(&mut self, gateway: &mut dyn TradingGateway) -> Result<(), TraderError> {
        gateway.close_out()?;
        info!(purchases = self.purchases.len(), "trading closed out for the day");
        for purchase in self.purchases.drain(..) {
            self.store.release(&purchase)?;
        }
        Ok(())
    }
}
