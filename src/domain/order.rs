//! Orders as the strategy sees them, independent of which gateway holds them.

use chrono::DateTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

/// Venue order states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    New,
    Accepted,
    PendingNew,
    AcceptedForBidding,
    PartiallyFilled,
    DoneForDay,
    Calculated,
    Filled,
    Canceled,
    Expired,
    Stopped,
    Rejected,
    Suspended,
    Replaced,
}

impl OrderStatus {
    /// The order will receive no further updates.
    pub fn is_completed(self) -> bool {
        self == OrderStatus::Filled || self.ended_unsuccessfully()
    }

    /// The order finished without filling.
    pub fn ended_unsuccessfully(self) -> bool {
        matches!(
            self,
            OrderStatus::Canceled
                | OrderStatus::Expired
                | OrderStatus::Stopped
                | OrderStatus::Rejected
                | OrderStatus::Suspended
        )
    }

    /// Working at the venue (not yet filled, not dead).
    pub fn is_working(self) -> bool {
        matches!(
            self,
            OrderStatus::New
                | OrderStatus::Accepted
                | OrderStatus::PendingNew
                | OrderStatus::AcceptedForBidding
                | OrderStatus::PartiallyFilled
                | OrderStatus::DoneForDay
                | OrderStatus::Calculated
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "new",
            OrderStatus::Accepted => "accepted",
            OrderStatus::PendingNew => "pending_new",
            OrderStatus::AcceptedForBidding => "accepted_for_bidding",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::DoneForDay => "done_for_day",
            OrderStatus::Calculated => "calculated",
            OrderStatus::Filled => "filled",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Expired => "expired",
            OrderStatus::Stopped => "stopped",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Suspended => "suspended",
            OrderStatus::Replaced => "replaced",
        };
        write!(f, "{}", s)
    }
}

/// Take-profit / stop-loss prices for a one-cancels-other sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub take_profit: Decimal,
    pub stop_price: Decimal,
    pub stop_limit: Decimal,
}

/// Percent offsets used to derive a [`Bracket`] from a fill price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketOffsets {
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub stop_limit_pct: Decimal,
}

impl Default for BracketOffsets {
    fn default() -> Self {
        BracketOffsets {
            take_profit_pct: Decimal::new(2, 1),
            stop_loss_pct: Decimal::new(12, 2),
            stop_limit_pct: Decimal::new(17, 2),
        }
    }
}

impl BracketOffsets {
    /// take_profit = base * (1 + tp%), stop = base * (1 - sl%), limit = base * (1 - lim%)
    pub fn bracket_for(&self, base: Decimal) -> Bracket {
        let hundred = Decimal::ONE_HUNDRED;
        Bracket {
            take_profit: base * (Decimal::ONE + self.take_profit_pct / hundred),
            stop_price: base * (Decimal::ONE - self.stop_loss_pct / hundred),
            stop_limit: base * (Decimal::ONE - self.stop_limit_pct / hundred),
        }
    }
}

/// What the strategy asks a gateway to place.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub bracket: Option<Bracket>,
}

impl OrderRequest {
    pub fn market_buy(symbol: &str, quantity: Decimal) -> Self {
        OrderRequest {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity,
            bracket: None,
        }
    }

    pub fn oco_sell(symbol: &str, quantity: Decimal, bracket: Bracket) -> Self {
        OrderRequest {
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::Limit,
            quantity,
            bracket: Some(bracket),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Take-profit limit for an OCO sell.
    pub limit_price: Option<Decimal>,
    /// Stop-loss trigger for an OCO sell.
    pub stop_price: Option<Decimal>,
    /// Floor the venue applies once the stop triggers.
    pub stop_limit_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_avg_price: Option<Decimal>,
    pub filled_qty: Decimal,
    pub created_at: DateTime<Tz>,
}

impl Order {
    /// A freshly accepted order built from a request.
    pub fn from_request(id: String, request: &OrderRequest, created_at: DateTime<Tz>) -> Self {
        Order {
            id,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.bracket.map(|b| b.take_profit),
            stop_price: request.bracket.map(|b| b.stop_price),
            stop_limit_price: request.bracket.map(|b| b.stop_limit),
            status: OrderStatus::New,
            filled_avg_price: None,
            filled_qty: Decimal::ZERO,
            created_at,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    pub fn mark_filled(&mut self, price: Decimal, quantity: Decimal) {
        self.status = OrderStatus::Filled;
        self.filled_avg_price = Some(price);
        self.filled_qty = quantity;
    }
}
