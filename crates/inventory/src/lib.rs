//! Inventory domain module.
//!
//! Stock arithmetic (floored at zero) and the append-only stock ledger. Pure
//! domain logic: no IO, no HTTP, no storage.

pub mod ledger;
pub mod stock;

pub use ledger::{StockHistory, StockReason};
pub use stock::StockChange;
