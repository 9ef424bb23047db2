//! Persistence of purchases between ticks.

use crate::domain::error::TraderError;
use crate::domain::purchase::Purchase;

pub trait PurchaseStore {
    /// Store a new purchase and return it with its assigned id.
    fn insert(&mut self, purchase: Purchase) -> Result<Purchase, TraderError>;

    /// Overwrite a previously inserted purchase, matched by id.
    fn update(&mut self, purchase: &Purchase) -> Result<(), TraderError>;

    fn list(&self) -> Result<Vec<Purchase>, TraderError>;

    /// Called at close-out for purchases the engine will no longer touch.
    /// Durable stores keep their rows.
    fn release(&mut self, _purchase: &Purchase) -> Result<(), TraderError> {
        Ok(())
    }
}
