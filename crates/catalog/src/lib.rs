//! Catalog domain module: stores and products with size/colour variants.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod store;

pub use product::{ColorVariant, Product, SizeVariant, StockTarget, VariantSelection};
pub use store::Store;
