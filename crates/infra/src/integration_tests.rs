//! Repository tests for the transactional order pipeline.
//!
//! Tests: checkout → order → status transition → stock + ledger
//!
//! Verifies:
//! - Stock decrements and ledger rows are written together
//! - Every move into SHIPPED or DELIVERED decrements, floored at zero
//! - A stale transition is rejected without side effects
//! - Store isolation is preserved
//!
//! The Postgres variants run only when `TEST_DATABASE_URL` is set.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use storedesk_catalog::{ColorVariant, Product, SizeVariant, Store, VariantSelection};
    use storedesk_core::{ColorId, Money, ProductId, SizeId, StoreId, UserId};
    use storedesk_inventory::StockReason;
    use storedesk_sales::{
        CheckoutLine, CustomerDetails, Order, OrderStatus, build_pending_order,
    };

    use crate::repository::{
        InMemoryRepository, PostgresRepository, Repository, RepositoryError, StockAdjustment,
    };

    fn owner() -> UserId {
        UserId::new("user_owner").unwrap()
    }

    async fn seed_store(repo: &dyn Repository) -> Store {
        let store = Store::new(StoreId::new(), "Shop", owner(), Utc::now() - Duration::days(3)).unwrap();
        repo.insert_store(&store).await.unwrap();
        store
    }

    async fn seed_product(repo: &dyn Repository, store: &Store, stock: u32) -> Product {
        let product = Product::new(
            ProductId::new(),
            store.id,
            "Mug",
            Money::from_minor(1_000),
            stock,
            Utc::now(),
        );
        repo.insert_product(&product).await.unwrap();
        product
    }

    async fn seed_variant_product(repo: &dyn Repository, store: &Store) -> (Product, SizeId, ColorId) {
        let size_id = SizeId::new();
        let color_id = ColorId::new();
        let product = Product::new(
            ProductId::new(),
            store.id,
            "Tee",
            Money::from_minor(2_500),
            0,
            Utc::now(),
        )
        .with_sizes(vec![SizeVariant {
            size_id,
            name: "M".into(),
            stock: 8,
        }])
        .with_colors(vec![ColorVariant {
            color_id,
            name: "Black".into(),
            value: "#000000".into(),
            stock: 5,
        }]);
        repo.insert_product(&product).await.unwrap();
        (product, size_id, color_id)
    }

    async fn place(repo: &dyn Repository, store: &Store, lines: &[CheckoutLine]) -> Order {
        let products = repo.list_products(store.id).await.unwrap();
        let order = build_pending_order(
            store.id,
            lines,
            &products,
            CustomerDetails {
                name: "Ann".into(),
                email: "ann@example.com".into(),
                ..CustomerDetails::default()
            },
            Utc::now(),
        )
        .unwrap();
        repo.insert_order(&order).await.unwrap();
        order
    }

    fn line(product_id: ProductId, quantity: u32) -> CheckoutLine {
        CheckoutLine {
            product_id,
            size_id: None,
            color_id: None,
            quantity,
        }
    }

    async fn shipping_writes_one_ledger_row_per_line(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let mug = seed_product(repo, &store, 10).await;
        let (tee, size_id, color_id) = seed_variant_product(repo, &store).await;

        let order = place(
            repo,
            &store,
            &[
                line(mug.id, 4),
                CheckoutLine {
                    product_id: tee.id,
                    size_id: Some(size_id),
                    color_id: Some(color_id),
                    quantity: 2,
                },
            ],
        )
        .await;

        let plan = order
            .plan_transition(OrderStatus::Shipped, owner().as_str(), Utc::now())
            .unwrap();
        let (saved, rows) = repo.commit_transition(&plan).await.unwrap();

        assert_eq!(saved.status, OrderStatus::Shipped);
        assert_eq!(rows.len(), 2);

        let mug_after = repo.get_product(store.id, mug.id).await.unwrap().unwrap();
        assert_eq!(mug_after.stock, 6);

        let tee_after = repo.get_product(store.id, tee.id).await.unwrap().unwrap();
        assert_eq!(tee_after.size(size_id).unwrap().stock, 6);
        assert_eq!(tee_after.color(color_id).unwrap().stock, 3);

        let tee_row = rows.iter().find(|r| r.product_id == tee.id).unwrap();
        assert_eq!((tee_row.old_stock, tee_row.new_stock), (5, 3));
        assert_eq!(tee_row.reason, format!("Order {} marked SHIPPED", order.id));

        let history = repo.list_stock_history(store.id, Some(mug.id)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!((history[0].old_stock, history[0].new_stock), (10, 6));
    }

    async fn stale_transition_is_rejected_without_side_effects(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let mug = seed_product(repo, &store, 10).await;
        let order = place(repo, &store, &[line(mug.id, 3)]).await;

        // Two owners read the same PENDING order and both decide to ship it.
        let first = order
            .plan_transition(OrderStatus::Shipped, "a", Utc::now())
            .unwrap();
        let second = order
            .plan_transition(OrderStatus::Delivered, "b", Utc::now())
            .unwrap();

        repo.commit_transition(&first).await.unwrap();
        let err = repo.commit_transition(&second).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let mug_after = repo.get_product(store.id, mug.id).await.unwrap().unwrap();
        assert_eq!(mug_after.stock, 7, "the rejected plan must not touch stock");
        assert_eq!(repo.list_stock_history(store.id, None).await.unwrap().len(), 1);
    }

    async fn failed_decrement_rolls_back_everything(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let mug = seed_product(repo, &store, 10).await;
        let order = place(repo, &store, &[line(mug.id, 1)]).await;

        let mut plan = order
            .plan_transition(OrderStatus::Shipped, "a", Utc::now())
            .unwrap();
        // A second line pointing at a variant the product does not have.
        let mut bogus = plan.decrements[0].clone();
        bogus.selection = VariantSelection::size(SizeId::new());
        plan.decrements.push(bogus);

        assert!(repo.commit_transition(&plan).await.is_err());

        let stored = repo.get_order(store.id, order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        let mug_after = repo.get_product(store.id, mug.id).await.unwrap().unwrap();
        assert_eq!(mug_after.stock, 10);
        assert!(repo.list_stock_history(store.id, None).await.unwrap().is_empty());
    }

    async fn delivery_after_shipping_decrements_again(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let mug = seed_product(repo, &store, 10).await;
        let mut order = place(repo, &store, &[line(mug.id, 3)]).await;

        let shipped = order
            .plan_transition(OrderStatus::Shipped, owner().as_str(), Utc::now())
            .unwrap();
        let (saved, _) = repo.commit_transition(&shipped).await.unwrap();
        order = saved;

        let delivered = order
            .plan_transition(OrderStatus::Delivered, owner().as_str(), Utc::now())
            .unwrap();
        let (saved, rows) = repo.commit_transition(&delivered).await.unwrap();

        assert_eq!(saved.status, OrderStatus::Delivered);
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].old_stock, rows[0].new_stock), (7, 4));
        assert_eq!(rows[0].reason, format!("Order {} marked DELIVERED", order.id));

        let mug_after = repo.get_product(store.id, mug.id).await.unwrap().unwrap();
        assert_eq!(mug_after.stock, 4);
        assert_eq!(repo.list_stock_history(store.id, Some(mug.id)).await.unwrap().len(), 2);
    }

    async fn shipping_more_than_on_hand_floors_at_zero(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let mug = seed_product(repo, &store, 10).await;
        let order = place(repo, &store, &[line(mug.id, 3)]).await;

        // Recount after checkout leaves less than the order needs.
        let adjustment = StockAdjustment {
            product_id: mug.id,
            selection: VariantSelection::none(),
            stock: 1,
            reason: StockReason::manual(Some("recount".into())),
            actor: owner().to_string(),
            at: Utc::now(),
        };
        repo.set_product_stock(store.id, &adjustment).await.unwrap();

        let plan = order
            .plan_transition(OrderStatus::Shipped, owner().as_str(), Utc::now())
            .unwrap();
        let (_, rows) = repo.commit_transition(&plan).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].old_stock, rows[0].new_stock), (1, 0));
        let mug_after = repo.get_product(store.id, mug.id).await.unwrap().unwrap();
        assert_eq!(mug_after.stock, 0);
    }

    async fn stores_are_isolated(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let other = seed_store(repo).await;
        let mug = seed_product(repo, &store, 10).await;
        let order = place(repo, &store, &[line(mug.id, 1)]).await;

        assert!(repo.get_order(other.id, order.id).await.unwrap().is_none());
        assert!(repo.get_product(other.id, mug.id).await.unwrap().is_none());
        assert!(repo.list_orders(other.id).await.unwrap().is_empty());
        assert!(!repo.delete_order(other.id, order.id).await.unwrap());
        assert!(repo.find_order(order.id).await.unwrap().is_some());
    }

    async fn manual_adjustment_is_ledgered(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let (tee, size_id, _) = seed_variant_product(repo, &store).await;

        let adjustment = StockAdjustment {
            product_id: tee.id,
            selection: VariantSelection::size(size_id),
            stock: 20,
            reason: StockReason::manual(Some("recount".into())),
            actor: owner().to_string(),
            at: Utc::now(),
        };
        let (product, row) = repo.set_product_stock(store.id, &adjustment).await.unwrap();

        assert_eq!(product.size(size_id).unwrap().stock, 20);
        assert_eq!((row.old_stock, row.new_stock), (8, 20));
        assert_eq!(row.reason, "Manual adjustment: recount");
        assert_eq!(row.size_id, Some(size_id));
    }

    async fn revenue_totals_only_count_paid_orders(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let mug = seed_product(repo, &store, 10).await;
        let paid = place(repo, &store, &[line(mug.id, 2)]).await;
        place(repo, &store, &[line(mug.id, 1)]).await;

        let plan = paid
            .plan_transition(OrderStatus::Paid, "payments", Utc::now())
            .unwrap();
        repo.commit_transition(&plan).await.unwrap();

        let totals = repo.paid_order_totals_by_day(store.id).await.unwrap();
        assert_eq!(totals, vec![(Utc::now().date_naive(), Money::from_minor(2_000))]);
    }

    async fn deleting_an_order_removes_it(repo: &dyn Repository) {
        let store = seed_store(repo).await;
        let mug = seed_product(repo, &store, 10).await;
        let order = place(repo, &store, &[line(mug.id, 1)]).await;

        assert!(repo.delete_order(store.id, order.id).await.unwrap());
        assert!(repo.get_order(store.id, order.id).await.unwrap().is_none());
        assert!(!repo.delete_order(store.id, order.id).await.unwrap());
    }

    // In-memory

    fn in_memory() -> Arc<dyn Repository> {
        Arc::new(InMemoryRepository::new())
    }

    #[tokio::test]
    async fn in_memory_shipping_writes_ledger() {
        shipping_writes_one_ledger_row_per_line(in_memory().as_ref()).await;
    }

    #[tokio::test]
    async fn in_memory_stale_transition() {
        stale_transition_is_rejected_without_side_effects(in_memory().as_ref()).await;
    }

    #[tokio::test]
    async fn in_memory_rollback() {
        failed_decrement_rolls_back_everything(in_memory().as_ref()).await;
    }

    #[tokio::test]
    async fn in_memory_delivery_decrements_again() {
        delivery_after_shipping_decrements_again(in_memory().as_ref()).await;
    }

    #[tokio::test]
    async fn in_memory_shipping_floors_at_zero() {
        shipping_more_than_on_hand_floors_at_zero(in_memory().as_ref()).await;
    }

    #[tokio::test]
    async fn in_memory_store_isolation() {
        stores_are_isolated(in_memory().as_ref()).await;
    }

    #[tokio::test]
    async fn in_memory_manual_adjustment() {
        manual_adjustment_is_ledgered(in_memory().as_ref()).await;
    }

    #[tokio::test]
    async fn in_memory_revenue_totals() {
        revenue_totals_only_count_paid_orders(in_memory().as_ref()).await;
    }

    #[tokio::test]
    async fn in_memory_delete_order() {
        deleting_an_order_removes_it(in_memory().as_ref()).await;
    }

    // Postgres (opt-in)

    async fn postgres() -> Option<Arc<dyn Repository>> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let repo = PostgresRepository::connect(&url).await.unwrap();
        repo.apply_schema().await.unwrap();
        Some(Arc::new(repo))
    }

    #[tokio::test]
    async fn postgres_pipeline() {
        let Some(repo) = postgres().await else {
            return;
        };
        shipping_writes_one_ledger_row_per_line(repo.as_ref()).await;
        stale_transition_is_rejected_without_side_effects(repo.as_ref()).await;
        failed_decrement_rolls_back_everything(repo.as_ref()).await;
        delivery_after_shipping_decrements_again(repo.as_ref()).await;
        shipping_more_than_on_hand_floors_at_zero(repo.as_ref()).await;
        stores_are_isolated(repo.as_ref()).await;
        manual_adjustment_is_ledgered(repo.as_ref()).await;
        revenue_totals_only_count_paid_orders(repo.as_ref()).await;
        deleting_an_order_removes_it(repo.as_ref()).await;
    }
}
