//! In-memory purchase store used by backtests.
//!
//! Holds only the purchases of the current trading day: close-out releases
//! them, so memory stays bounded over long runs.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::purchase::Purchase;
use crate::ports::purchase_store_port::PurchaseStore;

#[derive(Debug, Default)]
pub struct InMemoryPurchaseStore {
    purchases: BTreeMap<i64, Purchase>,
    next_id: i64,
}

impl InMemoryPurchaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PurchaseStore for InMemoryPurchaseStore {
    fn insert(&mut self, mut purchase: Purchase) -> Result<Purchase, TraderError> {
        self.next_id += 1;
        purchase.id = Some(self.next_id);
        self.purchases.insert(self.next_id, purchase.clone());
        Ok(purchase)
    }

    fn update(&mut self, purchase: &Purchase) -> Result<(), TraderError> {
        let slot = purchase
            .id
            .and_then(|id| self.purchases.get_mut(&id))
            .ok_or_else(|| TraderError::DataSource {
                reason: format!("purchase {:?} is not held", purchase.id),
            })?;
        *slot = purchase.clone();
        Ok(())
    }

    fn list(&self) -> Result<Vec<Purchase>, TraderError> {
        Ok(self.purchases.values().cloned().collect())
    }

    fn release(&mut self, purchase: &Purchase) -> Result<(), TraderError> {
        if let Some(id) = purchase.id {
            self.purchases.remove(&id);
        }
        Ok(())
    }
}
