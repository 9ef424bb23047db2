//! Probabilistic order fills against minute samples.
//!
//! Prices are deliberately pessimistic: buys fill at the minute's high and
//! sells at its low. A random gate leaves some orders unfilled on a given
//! tick to stand in for thin liquidity.
//!
//! OCO sells resolve the take-profit leg first: if the close has reached the
//! limit the order fills, even when the limit and stop coincide. Otherwise a
//! close at or below the stop fills. The stop-limit floor is carried on the
//! order for live venues but not enforced here, so a gap through the floor
//! still exits instead of leaving the position open.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use super::error::TraderError;
use super::order::{Order, OrderSide};
use super::price::PriceSample;

/// Share of fill attempts that pass the liquidity gate.
pub const DEFAULT_FILL_PROBABILITY: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Filled { price: Decimal, quantity: Decimal },
    Pending,
}

impl FillOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, FillOutcome::Filled { .. })
    }
}

#[derive(Debug, Clone)]
pub struct FillSimulator {
    probability: f64,
    rng: StdRng,
}

impl FillSimulator {
    /// `probability` is clamped into `[0, 1]`.
    pub fn new(probability: f64, seed: u64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        FillSimulator {
            probability,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Every attempt passes the gate; only price conditions decide.
    pub fn always() -> Self {
        Self::new(1.0, 0)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Try to fill `order` against `sample`, updating it in place on success.
    pub fn attempt_fill(
        &mut self,
        order: &mut Order,
        sample: &PriceSample,
    ) -> Result<FillOutcome, TraderError> {
        if order.side == OrderSide::Sell {
            check_sell_prices(order)?;
        }

        if !self.rng.gen_bool(self.probability) {
            return Ok(FillOutcome::Pending);
        }

        let price = match order.side {
            OrderSide::Buy => Some(sample.high),
            OrderSide::Sell => sell_price(order, sample)?,
        };

        match price {
            Some(price) => {
                order.mark_filled(price, order.quantity);
                Ok(FillOutcome::Filled {
                    price,
                    quantity: order.quantity,
                })
            }
            None => Ok(FillOutcome::Pending),
        }
    }
}

fn check_sell_prices(order: &Order) -> Result<(Decimal, Decimal), TraderError> {
    match (order.limit_price, order.stop_price) {
        (Some(limit), Some(stop)) => Ok((limit, stop)),
        (None, _) => Err(TraderError::InvalidOrderConfig {
            order_id: order.id.clone(),
            reason: "sell order has no take-profit limit price".into(),
        }),
        (_, None) => Err(TraderError::InvalidOrderConfig {
            order_id: order.id.clone(),
            reason: "sell order has no stop-loss price".into(),
        }),
    }
}

fn sell_price(order: &Order, sample: &PriceSample) -> Result<Option<Decimal>, TraderError> {
    let (limit, stop) = check_sell_prices(order)?;
    if sample.close >= limit || sample.close <= stop {
        Ok(Some(sample.low))
    } else {
        Ok(None)
    }
}
