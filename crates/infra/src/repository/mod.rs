//! Persistence boundary.
//!
//! Split per concern; [`Repository`] bundles all of them so services can hold a
//! single `Arc<dyn Repository>`. Every store-scoped query filters on the store
//! id, so one owner can never read another store's rows.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryRepository;
pub use postgres::PostgresRepository;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use storedesk_auth::User;
use storedesk_catalog::{Product, Store, VariantSelection};
use storedesk_core::{DomainError, Money, OrderId, ProductId, StoreId, UserId};
use storedesk_inventory::{StockHistory, StockReason};
use storedesk_sales::{Order, OrderStatus, StatusTransition};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The stored state moved on since it was read.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error in {operation}: {message}")]
    Database { operation: &'static str, message: String },

    /// A stored row could not be mapped back to a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Absolute stock write requested by an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub selection: VariantSelection,
    pub stock: u32,
    pub reason: StockReason,
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl RepositoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn upsert_user(&self, user: &User) -> Result<(), RepositoryError>;

    /// Returns whether a user was removed.
    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
}

#[async_trait::async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_store(&self, store: &Store) -> Result<(), RepositoryError>;

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError>;

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError>;

    async fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError>;

    async fn list_products(&self, store_id: StoreId) -> Result<Vec<Product>, RepositoryError>;

    /// Overwrite one stock record and append its ledger row atomically.
    async fn set_product_stock(
        &self,
        store_id: StoreId,
        adjustment: &StockAdjustment,
    ) -> Result<(Product, StockHistory), RepositoryError>;

    /// Ledger rows, newest first.
    async fn list_stock_history(
        &self,
        store_id: StoreId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockHistory>, RepositoryError>;
}

#[async_trait::async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get_order(
        &self,
        store_id: StoreId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Look up an order without knowing its store (payment callbacks).
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn list_orders(&self, store_id: StoreId) -> Result<Vec<Order>, RepositoryError>;

    /// Removes the order and its items. Returns whether it existed.
    async fn delete_order(&self, store_id: StoreId, order_id: OrderId) -> Result<bool, RepositoryError>;

    /// Commit a planned status change.
    ///
    /// In one atomic unit: verify the stored status still equals
    /// `transition.from` (else [`RepositoryError::Conflict`]), apply every
    /// planned decrement, append one ledger row per decrement and save the
    /// order. Nothing is written when any step fails.
    async fn commit_transition(
        &self,
        transition: &StatusTransition,
    ) -> Result<(Order, Vec<StockHistory>), RepositoryError>;

    /// Per-day sums of paid orders (by payment day, else creation day, UTC).
    async fn paid_order_totals_by_day(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<(NaiveDate, Money)>, RepositoryError>;
}

/// Everything the application needs from storage.
pub trait Repository: UserRepository + CatalogRepository + OrderRepository {}

impl<T> Repository for T where T: UserRepository + CatalogRepository + OrderRepository {}

pub(crate) fn stale_status(transition: &StatusTransition, current: OrderStatus) -> RepositoryError {
    RepositoryError::Conflict(format!(
        "order {} is {current}, expected {}; reload and retry",
        transition.order_id, transition.from
    ))
}
