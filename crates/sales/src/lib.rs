//! Sales domain module: orders, their status lifecycle, checkout and
//! order-derived views (search, customers).
//!
//! This crate contains business rules only, implemented as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod checkout;
pub mod customers;
pub mod order;
pub mod query;

pub use checkout::{CheckoutLine, build_pending_order};
pub use customers::{CustomerSummary, summarize_customers};
pub use order::{
    CustomerDetails, LineDecrement, Order, OrderItem, OrderStatus, StatusTransition,
};
pub use query::{OrderQuery, OrderSort};
