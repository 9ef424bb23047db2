//! A purchase pairs one buy order with at most one sell order.

use rust_decimal::Decimal;

use super::order::{Order, OrderStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    /// Assigned by the purchase store on insert.
    pub id: Option<i64>,
    pub buy_order: Order,
    pub sell_order: Option<Order>,
}

impl Purchase {
    pub fn new(buy_order: Order) -> Self {
        Purchase {
            id: None,
            buy_order,
            sell_order: None,
        }
    }

    pub fn buy_filled(&self) -> bool {
        self.buy_order.is_filled()
    }

    pub fn sell_filled(&self) -> bool {
        self.sell_order.as_ref().is_some_and(Order::is_filled)
    }

    pub fn buy_has_status(&self, status: OrderStatus) -> bool {
        self.buy_order.status == status
    }

    pub fn sell_has_status(&self, status: OrderStatus) -> bool {
        self.sell_order.as_ref().is_some_and(|o| o.status == status)
    }

    /// Buy is at any working stage.
    pub fn buy_in_progress(&self) -> bool {
        self.buy_order.status.is_working()
    }

    /// Sell is at any working stage.
    pub fn sell_in_progress(&self) -> bool {
        self.sell_order.as_ref().is_some_and(|o| o.status.is_working())
    }

    /// Buy order can still change (not in a completed state).
    pub fn in_progress_buy_order(&self) -> bool {
        !self.buy_order.status.is_completed()
    }

    /// Sell order exists and can still change.
    pub fn in_progress_sell_order(&self) -> bool {
        self.sell_order
            .as_ref()
            .is_some_and(|o| !o.status.is_completed())
    }

    /// No sell is working: none was placed, or the last one died unfilled.
    pub fn not_selling(&self) -> bool {
        match &self.sell_order {
            None => true,
            Some(o) => o.status.ended_unsuccessfully(),
        }
    }

    /// Counts against the concurrent purchase cap: the buy (or its sell) is
    /// still live and the shares have not been sold.
    pub fn is_open(&self) -> bool {
        if self.sell_filled() {
            return false;
        }
        self.buy_in_progress()
            || self.buy_filled()
            || self.sell_in_progress()
            || self.buy_has_status(OrderStatus::Replaced)
            || self.sell_has_status(OrderStatus::Replaced)
    }

    pub fn buy_filled_avg_price(&self) -> Option<Decimal> {
        self.buy_order.filled_avg_price
    }

    pub fn sell_filled_avg_price(&self) -> Option<Decimal> {
        self.sell_order.as_ref().and_then(|o| o.filled_avg_price)
    }
}
