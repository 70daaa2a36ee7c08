//! Postgres-backed repository.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (check constraint violation) | `23514` | `Domain(Validation)` |
//! | Database (other) | Any other | `Database` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Database` |
//!
//! ## Locking
//!
//! Status transitions and stock writes run in one transaction and take row
//! locks (`SELECT ... FOR UPDATE`) on the order first, then on each product in
//! ascending id order, so concurrent transitions serialize instead of losing
//! updates.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row};
use tracing::instrument;
use uuid::Uuid;

use storedesk_auth::User;
use storedesk_catalog::{ColorVariant, Product, SizeVariant, Store};
use storedesk_core::{
    CategoryId, ColorId, DomainError, Money, OrderId, OrderItemId, ProductId, SizeId,
    StockEntryId, StoreId, UserId,
};
use storedesk_inventory::StockHistory;
use storedesk_sales::{CustomerDetails, Order, OrderItem, OrderStatus, StatusTransition};

use super::{
    CatalogRepository, OrderRepository, RepositoryError, StockAdjustment, UserRepository,
    stale_status,
};

const SCHEMA: &str = include_str!("../../schema.sql");

const PRODUCT_COLUMNS: &str = r#"
    SELECT id, store_id, name, category_id, price, is_featured, is_archived, stock,
           created_at, updated_at
    FROM products
"#;

const ORDER_COLUMNS: &str = r#"
    SELECT id, store_id, status, customer_name, customer_email, customer_phone,
           customer_address, amount, created_at, updated_at, paid_at
    FROM orders
"#;

/// Postgres-backed repository.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and safe to share.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: Arc<PgPool>,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes.
    #[instrument(skip(self), err)]
    pub async fn apply_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl UserRepository for PostgresRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn upsert_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id)
            DO UPDATE SET
                email = EXCLUDED.email,
                name = EXCLUDED.name,
                image_url = EXCLUDED.image_url,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.image_url.as_deref())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, email, name, image_url, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user", e))?;

        row.map(|row| -> Result<User, RepositoryError> {
            Ok(User {
                id: UserId::new(col::<String>(&row, "id")?).map_err(corrupt)?,
                email: col(&row, "email")?,
                name: col(&row, "name")?,
                image_url: col(&row, "image_url")?,
                created_at: col(&row, "created_at")?,
                updated_at: col(&row, "updated_at")?,
            })
        })
        .transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl CatalogRepository for PostgresRepository {
    #[instrument(skip(self, store), fields(store_id = %store.id), err)]
    async fn insert_store(&self, store: &Store) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO stores (id, name, owner_id, created_at) VALUES ($1, $2, $3, $4)")
            .bind(*store.id.as_uuid())
            .bind(&store.name)
            .bind(store.owner_id.as_str())
            .bind(store.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_store", e))?;
        Ok(())
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, owner_id, created_at FROM stores WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_store", e))?;

        row.map(|row| -> Result<Store, RepositoryError> {
            Ok(Store {
                id: StoreId::from_uuid(col(&row, "id")?),
                name: col(&row, "name")?,
                owner_id: UserId::new(col::<String>(&row, "owner_id")?).map_err(corrupt)?,
                created_at: col(&row, "created_at")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, product), fields(store_id = %product.store_id, product_id = %product.id), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        product.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, store_id, name, category_id, price, is_featured, is_archived, stock,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*product.id.as_uuid())
        .bind(*product.store_id.as_uuid())
        .bind(&product.name)
        .bind(product.category_id.map(|c| *c.as_uuid()))
        .bind(db_money(product.price)?)
        .bind(product.is_featured)
        .bind(product.is_archived)
        .bind(i64::from(product.stock))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        for (position, size) in product.sizes.iter().enumerate() {
            sqlx::query(
                "INSERT INTO product_sizes (product_id, size_id, name, stock, position) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(*product.id.as_uuid())
            .bind(*size.size_id.as_uuid())
            .bind(&size.name)
            .bind(i64::from(size.stock))
            .bind(db_position(position)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_product_size", e))?;
        }

        for (position, color) in product.colors.iter().enumerate() {
            sqlx::query(
                "INSERT INTO product_colors (product_id, color_id, name, value, stock, position) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(*product.id.as_uuid())
            .bind(*color.color_id.as_uuid())
            .bind(&color.name)
            .bind(&color.value)
            .bind(i64::from(color.stock))
            .bind(db_position(position)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_product_color", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        fetch_product(&mut conn, store_id, product_id, false).await
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_products(&self, store_id: StoreId) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;

        let sql = format!("{PRODUCT_COLUMNS} WHERE store_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query(&sql)
            .bind(*store_id.as_uuid())
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        let mut products = rows
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<Uuid> = products.iter().map(|p| *p.id.as_uuid()).collect();
        attach_variants(&mut conn, &mut products, &ids, false).await?;
        Ok(products)
    }

    #[instrument(
        skip(self, adjustment),
        fields(store_id = %store_id, product_id = %adjustment.product_id, stock = adjustment.stock),
        err
    )]
    async fn set_product_stock(
        &self,
        store_id: StoreId,
        adjustment: &StockAdjustment,
    ) -> Result<(Product, StockHistory), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut product = fetch_product(&mut tx, store_id, adjustment.product_id, true)
            .await?
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

        save_stock(&mut tx, &product).await?;
        insert_ledger_row(&mut tx, &row).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok((product, row))
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_stock_history(
        &self,
        store_id: StoreId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockHistory>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, store_id, product_id, size_id, color_id, old_stock, new_stock,
                   reason, actor, created_at
            FROM stock_history
            WHERE store_id = $1
                AND ($2::uuid IS NULL OR product_id = $2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(*store_id.as_uuid())
        .bind(product_id.map(|p| *p.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stock_history", e))?;

        rows.iter()
            .map(|row| -> Result<StockHistory, RepositoryError> {
                Ok(StockHistory {
                    id: StockEntryId::from_uuid(col(row, "id")?),
                    store_id: StoreId::from_uuid(col(row, "store_id")?),
                    product_id: ProductId::from_uuid(col(row, "product_id")?),
                    size_id: col::<Option<Uuid>>(row, "size_id")?.map(SizeId::from_uuid),
                    color_id: col::<Option<Uuid>>(row, "color_id")?.map(ColorId::from_uuid),
                    old_stock: count(col(row, "old_stock")?, "old_stock")?,
                    new_stock: count(col(row, "new_stock")?, "new_stock")?,
                    reason: col(row, "reason")?,
                    actor: col(row, "actor")?,
                    created_at: col(row, "created_at")?,
                })
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl OrderRepository for PostgresRepository {
    #[instrument(skip(self, order), fields(store_id = %order.store_id, order_id = %order.id), err)]
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, store_id, status, customer_name, customer_email, customer_phone,
                customer_address, amount, created_at, updated_at, paid_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*order.id.as_uuid())
        .bind(*order.store_id.as_uuid())
        .bind(order.status.as_str())
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(&order.customer.phone)
        .bind(&order.customer.address)
        .bind(db_money(order.amount)?)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name, size_id, color_id, quantity,
                    unit_price, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(*item.id.as_uuid())
            .bind(*order.id.as_uuid())
            .bind(*item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.size_id.map(|s| *s.as_uuid()))
            .bind(item.color_id.map(|c| *c.as_uuid()))
            .bind(i64::from(item.quantity))
            .bind(db_money(item.unit_price)?)
            .bind(db_position(position)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_order(
        &self,
        store_id: StoreId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        fetch_order(&mut conn, order_id, Some(store_id), false).await
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        fetch_order(&mut conn, order_id, None, false).await
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_orders(&self, store_id: StoreId) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;

        let sql = format!("{ORDER_COLUMNS} WHERE store_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query(&sql)
            .bind(*store_id.as_uuid())
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("list_orders", e))?;

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| col::<Uuid>(row, "id"))
            .collect::<Result<_, _>>()?;
        let mut items = fetch_items(&mut conn, &ids).await?;

        rows.iter()
            .map(|row| -> Result<Order, RepositoryError> {
                let id: Uuid = col(row, "id")?;
                order_from_row(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    #[instrument(skip(self), fields(store_id = %store_id, order_id = %order_id), err)]
    async fn delete_order(&self, store_id: StoreId, order_id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE store_id = $1 AND id = $2")
            .bind(*store_id.as_uuid())
            .bind(*order_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(
        skip(self, transition),
        fields(
            store_id = %transition.store_id,
            order_id = %transition.order_id,
            from = %transition.from,
            to = %transition.to,
            decrements = transition.decrements.len()
        ),
        err
    )]
    async fn commit_transition(
        &self,
        transition: &StatusTransition,
    ) -> Result<(Order, Vec<StockHistory>), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut order = fetch_order(&mut tx, transition.order_id, Some(transition.store_id), true)
            .await?
            .ok_or_else(|| RepositoryError::not_found(format!("order {}", transition.order_id)))?;
        if order.status != transition.from {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(stale_status(transition, order.status));
        }

        // Lock products in a fixed order.
        let product_ids: BTreeSet<ProductId> =
            transition.decrements.iter().map(|d| d.product_id).collect();
        let mut products: HashMap<ProductId, Product> = HashMap::new();
        for product_id in product_ids {
            let product = fetch_product(&mut tx, transition.store_id, product_id, true)
                .await?
                .ok_or_else(|| RepositoryError::not_found(format!("product {product_id}")))?;
            products.insert(product_id, product);
        }

        let reason = transition.stock_reason();
        let mut rows = Vec::with_capacity(transition.decrements.len());
        for line in &transition.decrements {
            let product = products
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

        for product in products.values() {
            save_stock(&mut tx, product).await?;
        }
        for row in &rows {
            insert_ledger_row(&mut tx, row).await?;
        }

        order.apply_transition(transition);
        sqlx::query(
            r#"
            UPDATE orders SET
                status = $1,
                updated_at = $2,
                paid_at = $3,
                customer_name = $4,
                customer_email = $5,
                customer_phone = $6,
                customer_address = $7
            WHERE id = $8
            "#,
        )
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(order.paid_at)
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(&order.customer.phone)
        .bind(&order.customer.address)
        .bind(*order.id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok((order, rows))
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn paid_order_totals_by_day(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<(NaiveDate, Money)>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                (COALESCE(paid_at, created_at) AT TIME ZONE 'UTC')::date AS day,
                SUM(amount)::bigint AS total
            FROM orders
            WHERE store_id = $1
                AND status IN ('PAID', 'SHIPPED', 'DELIVERED')
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(*store_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("paid_order_totals_by_day", e))?;

        rows.iter()
            .map(|row| -> Result<(NaiveDate, Money), RepositoryError> {
                Ok((col(row, "day")?, money(col(row, "total")?)?))
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn fetch_product(
    conn: &mut PgConnection,
    store_id: StoreId,
    product_id: ProductId,
    lock: bool,
) -> Result<Option<Product>, RepositoryError> {
    let sql = format!(
        "{PRODUCT_COLUMNS} WHERE store_id = $1 AND id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(*store_id.as_uuid())
        .bind(*product_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("fetch_product", e))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut products = vec![product_from_row(&row)?];
    attach_variants(conn, &mut products, &[*product_id.as_uuid()], lock).await?;
    Ok(products.pop())
}

fn product_from_row(row: &PgRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId::from_uuid(col(row, "id")?),
        store_id: StoreId::from_uuid(col(row, "store_id")?),
        name: col(row, "name")?,
        category_id: col::<Option<Uuid>>(row, "category_id")?.map(CategoryId::from_uuid),
        price: money(col(row, "price")?)?,
        is_featured: col(row, "is_featured")?,
        is_archived: col(row, "is_archived")?,
        stock: count(col(row, "stock")?, "stock")?,
        sizes: Vec::new(),
        colors: Vec::new(),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

async fn attach_variants(
    conn: &mut PgConnection,
    products: &mut [Product],
    ids: &[Uuid],
    lock: bool,
) -> Result<(), RepositoryError> {
    if ids.is_empty() {
        return Ok(());
    }
    let suffix = if lock { " FOR UPDATE" } else { "" };

    let size_rows = sqlx::query(&format!(
        "SELECT product_id, size_id, name, stock FROM product_sizes WHERE product_id = ANY($1) ORDER BY product_id, position{suffix}"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("fetch_product_sizes", e))?;

    let color_rows = sqlx::query(&format!(
        "SELECT product_id, color_id, name, value, stock FROM product_colors WHERE product_id = ANY($1) ORDER BY product_id, position{suffix}"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("fetch_product_colors", e))?;

    let mut sizes: HashMap<Uuid, Vec<SizeVariant>> = HashMap::new();
    for row in &size_rows {
        sizes
            .entry(col(row, "product_id")?)
            .or_default()
            .push(SizeVariant {
                size_id: SizeId::from_uuid(col(row, "size_id")?),
                name: col(row, "name")?,
                stock: count(col(row, "stock")?, "size stock")?,
            });
    }

    let mut colors: HashMap<Uuid, Vec<ColorVariant>> = HashMap::new();
    for row in &color_rows {
        colors
            .entry(col(row, "product_id")?)
            .or_default()
            .push(ColorVariant {
                color_id: ColorId::from_uuid(col(row, "color_id")?),
                name: col(row, "name")?,
                value: col(row, "value")?,
                stock: count(col(row, "stock")?, "color stock")?,
            });
    }

    for product in products.iter_mut() {
        let id = *product.id.as_uuid();
        product.sizes = sizes.remove(&id).unwrap_or_default();
        product.colors = colors.remove(&id).unwrap_or_default();
    }
    Ok(())
}

/// Write back every stock record of a product.
async fn save_stock(conn: &mut PgConnection, product: &Product) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE products SET stock = $1, updated_at = $2 WHERE id = $3")
        .bind(i64::from(product.stock))
        .bind(product.updated_at)
        .bind(*product.id.as_uuid())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("update_product_stock", e))?;

    for size in &product.sizes {
        sqlx::query("UPDATE product_sizes SET stock = $1 WHERE product_id = $2 AND size_id = $3")
            .bind(i64::from(size.stock))
            .bind(*product.id.as_uuid())
            .bind(*size.size_id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("update_size_stock", e))?;
    }

    for color in &product.colors {
        sqlx::query("UPDATE product_colors SET stock = $1 WHERE product_id = $2 AND color_id = $3")
            .bind(i64::from(color.stock))
            .bind(*product.id.as_uuid())
            .bind(*color.color_id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("update_color_stock", e))?;
    }
    Ok(())
}

async fn insert_ledger_row(conn: &mut PgConnection, row: &StockHistory) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO stock_history (
            id, store_id, product_id, size_id, color_id, old_stock, new_stock, reason,
            actor, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(*row.id.as_uuid())
    .bind(*row.store_id.as_uuid())
    .bind(*row.product_id.as_uuid())
    .bind(row.size_id.map(|s| *s.as_uuid()))
    .bind(row.color_id.map(|c| *c.as_uuid()))
    .bind(i64::from(row.old_stock))
    .bind(i64::from(row.new_stock))
    .bind(&row.reason)
    .bind(&row.actor)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_stock_history", e))?;
    Ok(())
}

async fn fetch_order(
    conn: &mut PgConnection,
    order_id: OrderId,
    store_id: Option<StoreId>,
    lock: bool,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!(
        "{ORDER_COLUMNS} WHERE id = $1 AND ($2::uuid IS NULL OR store_id = $2){}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(*order_id.as_uuid())
        .bind(store_id.map(|s| *s.as_uuid()))
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("fetch_order", e))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut items = fetch_items(conn, &[*order_id.as_uuid()]).await?;
    order_from_row(&row, items.remove(order_id.as_uuid()).unwrap_or_default()).map(Some)
}

async fn fetch_items(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepositoryError> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query(
        r#"
        SELECT id, order_id, product_id, product_name, size_id, color_id, quantity, unit_price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, position
        "#,
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("fetch_order_items", e))?;

    let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in &rows {
        items
            .entry(col(row, "order_id")?)
            .or_default()
            .push(OrderItem {
                id: OrderItemId::from_uuid(col(row, "id")?),
                product_id: ProductId::from_uuid(col(row, "product_id")?),
                product_name: col(row, "product_name")?,
                size_id: col::<Option<Uuid>>(row, "size_id")?.map(SizeId::from_uuid),
                color_id: col::<Option<Uuid>>(row, "color_id")?.map(ColorId::from_uuid),
                quantity: count(col(row, "quantity")?, "quantity")?,
                unit_price: money(col(row, "unit_price")?)?,
            });
    }
    Ok(items)
}

fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let status: String = col(row, "status")?;
    Ok(Order {
        id: OrderId::from_uuid(col(row, "id")?),
        store_id: StoreId::from_uuid(col(row, "store_id")?),
        status: status.parse::<OrderStatus>().map_err(corrupt)?,
        customer: CustomerDetails {
            name: col(row, "customer_name")?,
            email: col(row, "customer_email")?,
            phone: col(row, "customer_phone")?,
            address: col(row, "customer_address")?,
        },
        items,
        amount: money(col(row, "amount")?)?,
        created_at: col::<DateTime<Utc>>(row, "created_at")?,
        updated_at: col::<DateTime<Utc>>(row, "updated_at")?,
        paid_at: col::<Option<DateTime<Utc>>>(row, "paid_at")?,
    })
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Corrupt(format!("column {name}: {e}")))
}

fn corrupt(err: DomainError) -> RepositoryError {
    RepositoryError::Corrupt(err.to_string())
}

fn count(value: i64, what: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| RepositoryError::Corrupt(format!("{what} out of range: {value}")))
}

fn money(value: i64) -> Result<Money, RepositoryError> {
    u64::try_from(value)
        .map(Money::from_minor)
        .map_err(|_| RepositoryError::Corrupt(format!("negative amount: {value}")))
}

fn db_money(value: Money) -> Result<i64, RepositoryError> {
    i64::try_from(value.minor_units())
        .map_err(|_| RepositoryError::Domain(DomainError::validation("amount too large")))
}

fn db_position(position: usize) -> Result<i32, RepositoryError> {
    i32::try_from(position).map_err(|_| RepositoryError::Domain(DomainError::validation("too many entries")))
}

/// Map SQLx errors to repository errors.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") => RepositoryError::Conflict(format!("{operation}: {message}")),
                Some("23503") => RepositoryError::NotFound(format!("{operation}: {message}")),
                Some("23514") => RepositoryError::Domain(DomainError::validation(message)),
                _ => RepositoryError::Database { operation, message },
            }
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound(operation.to_string()),
        other => RepositoryError::Database {
            operation,
            message: other.to_string(),
        },
    }
}
