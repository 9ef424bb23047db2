//! Cash and share bookkeeping for a simulated account.

use rust_decimal::Decimal;

use super::order::OrderSide;
use super::price::PriceSample;

/// (end - start) / start * 100. Zero when `start` is zero.
pub fn profit_loss_percent(start: Decimal, end: Decimal) -> Decimal {
    (end - start)
        .checked_div(start)
        .map(|ratio| ratio * Decimal::ONE_HUNDRED)
        .unwrap_or(Decimal::ZERO)
}

/// Cash at the start and end of one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCash {
    pub start: Decimal,
    pub end: Decimal,
}

impl DayCash {
    pub fn profit_loss_percent(&self) -> Decimal {
        profit_loss_percent(self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioLedger {
    cash: Decimal,
    shares_held: Decimal,
    cash_at_day_start: Decimal,
    cash_at_session_start: Decimal,
}

impl PortfolioLedger {
    pub fn new(starting_cash: Decimal) -> Self {
        PortfolioLedger {
            cash: starting_cash,
            shares_held: Decimal::ZERO,
            cash_at_day_start: starting_cash,
            cash_at_session_start: starting_cash,
        }
    }

    /// Buy: cash -= price * qty, shares += qty. Sell is the inverse.
    pub fn apply_fill(&mut self, side: OrderSide, price: Decimal, quantity: Decimal) {
        let notional = price * quantity;
        match side {
            OrderSide::Buy => {
                self.cash -= notional;
                self.shares_held += quantity;
            }
            OrderSide::Sell => {
                self.cash += notional;
                self.shares_held -= quantity;
            }
        }
    }

    /// Market-sell everything at the sample's low and return the proceeds.
    ///
    /// Using the low is a deliberate worst case for a market order.
    pub fn liquidate(&mut self, sample: &PriceSample) -> Decimal {
        let proceeds = sample.low * self.shares_held;
        self.cash += proceeds;
        self.shares_held = Decimal::ZERO;
        proceeds
    }

    pub fn snapshot_day_start(&mut self) {
        self.cash_at_day_start = self.cash;
    }

    pub fn snapshot_day_end(&self) -> DayCash {
        DayCash {
            start: self.cash_at_day_start,
            end: self.cash,
        }
    }

    /// Whole-run P&L relative to the starting cash.
    pub fn session_profit_loss_percent(&self) -> Decimal {
        profit_loss_percent(self.cash_at_session_start, self.cash)
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn shares_held(&self) -> Decimal {
        self.shares_held
    }

    pub fn cash_at_day_start(&self) -> Decimal {
        self.cash_at_day_start
    }

    pub fn cash_at_session_start(&self) -> Decimal {
        self.cash_at_session_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_ledger() {
        let ledger = PortfolioLedger::new(dec!(100000));
        assert_eq!(ledger.cash(), dec!(100000));
        assert_eq!(ledger.shares_held(), Decimal::ZERO);
        assert_eq!(ledger.cash_at_day_start(), dec!(100000));
        assert_eq!(ledger.cash_at_session_start(), dec!(100000));
    }

    #[test]
    fn buy_fill_debits_cash() {
        let mut ledger = PortfolioLedger::new(dec!(100000));
        ledger.apply_fill(OrderSide::Buy, dec!(102.5), dec!(10));
        assert_eq!(ledger.cash(), dec!(98975));
        assert_eq!(ledger.shares_held(), dec!(10));
    }

    #[test]
    fn sell_fill_credits_cash() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(5));
        ledger.apply_fill(OrderSide::Sell, dec!(11), dec!(5));
        assert_eq!(ledger.cash(), dec!(1005));
        assert_eq!(ledger.shares_held(), Decimal::ZERO);
    }

    #[test]
    fn round_trip_at_same_price_has_no_drift() {
        let start = dec!(100000);
        let mut ledger = PortfolioLedger::new(start);
        for _ in 0..10_000 {
            ledger.apply_fill(OrderSide::Buy, dec!(0.1), dec!(3));
            ledger.apply_fill(OrderSide::Sell, dec!(0.1), dec!(3));
        }
        assert_eq!(ledger.cash(), start);
        assert_eq!(ledger.shares_held(), Decimal::ZERO);
    }

    #[test]
    fn liquidate_sells_at_low() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        ledger.apply_fill(OrderSide::Buy, dec!(50), dec!(10));
        let proceeds = ledger.liquidate(&PriceSample::new(dec!(52), dec!(48), dec!(51)));
        assert_eq!(proceeds, dec!(480));
        assert_eq!(ledger.cash(), dec!(980));
        assert_eq!(ledger.shares_held(), Decimal::ZERO);
    }

    #[test]
    fn liquidate_with_nothing_held() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        let proceeds = ledger.liquidate(&PriceSample::flat(dec!(50)));
        assert_eq!(proceeds, Decimal::ZERO);
        assert_eq!(ledger.cash(), dec!(1000));
    }

    #[test]
    fn day_snapshots() {
        let mut ledger = PortfolioLedger::new(dec!(1000));
        ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(10));
        ledger.apply_fill(OrderSide::Sell, dec!(12), dec!(10));

        let day = ledger.snapshot_day_end();
        assert_eq!(day.start, dec!(1000));
        assert_eq!(day.end, dec!(1020));
        assert_eq!(day.profit_loss_percent(), dec!(2));

        ledger.snapshot_day_start();
        assert_eq!(ledger.cash_at_day_start(), dec!(1020));
        assert_eq!(ledger.session_profit_loss_percent(), dec!(2));
    }

    #[test]
    fn profit_loss_percent_values() {
        assert_eq!(profit_loss_percent(dec!(100), dec!(110)), dec!(10));
        assert_eq!(profit_loss_percent(dec!(100), dec!(95)), dec!(-5));
        assert_eq!(profit_loss_percent(dec!(200), dec!(200)), Decimal::ZERO);
    }

    #[test]
    fn profit_loss_percent_zero_start() {
        assert_eq!(profit_loss_percent(Decimal::ZERO, dec!(10)), Decimal::ZERO);
    }
}
