//! Port traits: the seams between trading logic and the outside world.

pub mod config_port;
pub mod data_port;
pub mod gateway_port;
pub mod purchase_store_port;
pub mod report_port;
