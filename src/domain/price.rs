//! Raw bar records and the per-minute price sample kept for simulation.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::error::TraderError;

/// One unparsed row from a historical data source:
/// `(timestamp, open, high, low, close)` as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRecord {
    pub timestamp: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
}

impl BarRecord {
    pub fn new(timestamp: &str, open: &str, high: &str, low: &str, close: &str) -> Self {
        BarRecord {
            timestamp: timestamp.to_string(),
            open: open.to_string(),
            high: high.to_string(),
            low: low.to_string(),
            close: close.to_string(),
        }
    }

    /// Parse the four price columns. `line` is only used for error context.
    ///
    /// The open column must be a valid decimal but is not retained.
    pub fn parse_prices(&self, line: usize) -> Result<PriceSample, TraderError> {
        parse_decimal(&self.open, "open", line)?;
        Ok(PriceSample {
            high: parse_decimal(&self.high, "high", line)?,
            low: parse_decimal(&self.low, "low", line)?,
            close: parse_decimal(&self.close, "close", line)?,
        })
    }
}

fn parse_decimal(value: &str, column: &str, line: usize) -> Result<Decimal, TraderError> {
    Decimal::from_str(value.trim()).map_err(|e| TraderError::DataFormat {
        line,
        reason: format!("invalid {} value {:?}: {}", column, value, e),
    })
}

/// High/low/close for a single minute. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSample {
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl PriceSample {
    pub fn new(high: Decimal, low: Decimal, close: Decimal) -> Self {
        PriceSample { high, low, close }
    }

    /// A sample where high, low and close are all `price`.
    pub fn flat(price: Decimal) -> Self {
        PriceSample {
            high: price,
            low: price,
            close: price,
        }
    }
}
