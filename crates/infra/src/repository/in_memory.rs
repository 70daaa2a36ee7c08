use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;

use storedesk_analytics::daily_paid_totals;
use storedesk_auth::User;
use storedesk_catalog::{Product, Store};
use storedesk_core::{Money, OrderId, ProductId, StoreId, UserId};
use storedesk_inventory::StockHistory;
use storedesk_sales::{Order, StatusTransition};

use super::{
    CatalogRepository, OrderRepository, RepositoryError, StockAdjustment, UserRepository,
    stale_status,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    stores: HashMap<StoreId, Store>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    ledger: Vec<StockHistory>,
}

impl State {
    fn product(&self, store_id: StoreId, product_id: ProductId) -> Option<&Product> {
        self.products
            .get(&product_id)
            .filter(|p| p.store_id == store_id)
    }

    fn order(&self, store_id: StoreId, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id).filter(|o| o.store_id == store_id)
    }
}

/// In-memory repository for tests/dev.
///
/// A single lock guards all tables, so every write (including a status
/// transition with its stock changes) is atomic with respect to readers.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    inner: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, RepositoryError> {
        self.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, RepositoryError> {
        self.inner.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Database {
        operation: "lock",
        message: "in-memory store lock poisoned".to_string(),
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let created_at = state
            .users
            .get(&user.id)
            .map(|u| u.created_at)
            .unwrap_or(user.created_at);
        let mut user = user.clone();
        user.created_at = created_at;
        state.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError> {
        Ok(self.write()?.users.remove(id).is_some())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.read()?.users.get(id).cloned())
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn insert_store(&self, store: &Store) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if state.stores.contains_key(&store.id) {
            return Err(RepositoryError::Conflict(format!("store {} exists", store.id)));
        }
        state.stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        Ok(self.read()?.stores.get(&id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        product.validate()?;
        let mut state = self.write()?;
        if !state.stores.contains_key(&product.store_id) {
            return Err(RepositoryError::not_found(format!("store {}", product.store_id)));
        }
        if state.products.contains_key(&product.id) {
            return Err(RepositoryError::Conflict(format!("product {} exists", product.id)));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        Ok(self.read()?.product(store_id, product_id).cloned())
    }

    async fn list_products(&self, store_id: StoreId) -> Result<Vec<Product>, RepositoryError> {
        let state = self.read()?;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.store_id == store_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn set_product_stock(
        &self,
        store_id: StoreId,
        adjustment: &StockAdjustment,
    ) -> Result<(Product, StockHistory), RepositoryError> {
        let mut state = self.write()?;
        let mut product = state
            .product(store_id, adjustment.product_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("product {}", adjustment.product_id)))?;

        let change = product.set_stock(adjustment.selection, adjustment.stock, adjustment.at)?;
        let row = StockHistory::record(
            store_id,
            product.id,
            adjustment.selection.size_id,
            adjustment.selection.color_id,
            change,
            &adjustment.reason,
            adjustment.actor.clone(),
            adjustment.at,
        );

        state.products.insert(product.id, product.clone());
        state.ledger.push(row.clone());
        Ok((product, row))
    }

    async fn list_stock_history(
        &self,
        store_id: StoreId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockHistory>, RepositoryError> {
        let state = self.read()?;
        let mut rows: Vec<StockHistory> = state
            .ledger
            .iter()
            .filter(|r| r.store_id == store_id)
            .filter(|r| product_id.is_none_or(|p| r.product_id == p))
            .cloned()
            .collect();
        // Ledger is append-ordered; newest first, stable for equal timestamps.
        rows.reverse();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryRepository {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if !state.stores.contains_key(&order.store_id) {
            return Err(RepositoryError::not_found(format!("store {}", order.store_id)));
        }
        if state.orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict(format!("order {} exists", order.id)));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(
        &self,
        store_id: StoreId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self.read()?.order(store_id, order_id).cloned())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.read()?.orders.get(&order_id).cloned())
    }

    async fn list_orders(&self, store_id: StoreId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.read()?;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.store_id == store_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn delete_order(&self, store_id: StoreId, order_id: OrderId) -> Result<bool, RepositoryError> {
        let mut state = self.write()?;
        if state.order(store_id, order_id).is_none() {
            return Ok(false);
        }
        Ok(state.orders.remove(&order_id).is_some())
    }

    async fn commit_transition(
        &self,
        transition: &StatusTransition,
    ) -> Result<(Order, Vec<StockHistory>), RepositoryError> {
        let mut state = self.write()?;

        let mut order = state
            .order(transition.store_id, transition.order_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("order {}", transition.order_id)))?;
        if order.status != transition.from {
            return Err(stale_status(transition, order.status));
        }

        // Work on copies; nothing is stored until every decrement succeeded.
        let mut touched: HashMap<ProductId, Product> = HashMap::new();
        let mut rows = Vec::with_capacity(transition.decrements.len());
        let reason = transition.stock_reason();
        for line in &transition.decrements {
            if !touched.contains_key(&line.product_id) {
                let product = state
                    .product(transition.store_id, line.product_id)
                    .cloned()
                    .ok_or_else(|| RepositoryError::not_found(format!("product {}", line.product_id)))?;
                touched.insert(line.product_id, product);
            }
            let product = touched
                .get_mut(&line.product_id)
                .ok_or_else(|| RepositoryError::not_found(format!("product {}", line.product_id)))?;

            let change = product.decrement(line.selection, line.quantity, transition.occurred_at)?;
            rows.push(StockHistory::record(
                transition.store_id,
                line.product_id,
                line.selection.size_id,
                line.selection.color_id,
                change,
                &reason,
                transition.actor.clone(),
                transition.occurred_at,
            ));
        }

        order.apply_transition(transition);

        state.products.extend(touched);
        state.ledger.extend(rows.iter().cloned());
        state.orders.insert(order.id, order.clone());
        Ok((order, rows))
    }

    async fn paid_order_totals_by_day(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<(NaiveDate, Money)>, RepositoryError> {
        let state = self.read()?;
        let totals = daily_paid_totals(state.orders.values().filter(|o| o.store_id == store_id));
        Ok(totals.into_iter().collect())
    }
}
