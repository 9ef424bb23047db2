//! Core domain types and logic.

pub mod backtest;
pub mod clock;
pub mod config_validation;
pub mod error;
pub mod fill;
pub mod history;
pub mod ledger;
pub mod order;
pub mod price;
pub mod purchase;
pub mod signal;
pub mod strategy;
