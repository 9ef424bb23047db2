//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod memory_store;
pub mod simulated_gateway;
pub mod text_report_adapter;
