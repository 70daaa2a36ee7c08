//! `storedesk-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::{Entity, Timestamped};
pub use error::{DomainError, DomainResult};
pub use id::{
    CategoryId, ColorId, OrderId, OrderItemId, ProductId, SizeId, StockEntryId, StoreId, UserId,
};
pub use value_object::{Money, ValueObject};
