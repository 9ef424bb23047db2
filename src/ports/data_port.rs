//! Historical minute-bar source.

use crate::domain::error::TraderError;
use crate::domain::price::BarRecord;

pub trait HistoryPort {
    /// All raw records, in file order. Prices stay as text until the series
    /// is built so a malformed field can be reported with its line.
    fn fetch_records(&self) -> Result<Vec<BarRecord>, TraderError>;
}
