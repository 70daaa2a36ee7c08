//! Storefront checkout: turn a cart into a pending order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storedesk_catalog::{Product, VariantSelection};
use storedesk_core::{
    ColorId, DomainError, DomainResult, OrderId, OrderItemId, ProductId, SizeId, StoreId,
};

use crate::order::{CustomerDetails, Order, OrderItem};

/// One cart line as submitted by the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub size_id: Option<SizeId>,
    #[serde(default)]
    pub color_id: Option<ColorId>,
    pub quantity: u32,
}

impl CheckoutLine {
    pub fn selection(&self) -> VariantSelection {
        VariantSelection {
            size_id: self.size_id,
            color_id: self.color_id,
        }
    }
}

/// Validate a cart against the catalog and price it.
///
/// Prices and product names are taken from the catalog, never from the cart.
/// Stock is checked but not reserved; it is consumed when the order ships.
pub fn build_pending_order(
    store_id: StoreId,
    lines: &[CheckoutLine],
    products: &[Product],
    customer: CustomerDetails,
    at: DateTime<Utc>,
) -> DomainResult<Order> {
    if lines.is_empty() {
        return Err(DomainError::validation("product ids are required"));
    }

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let product = products
            .iter()
            .find(|p| p.id == line.product_id && p.store_id == store_id)
            .ok_or_else(|| DomainError::not_found(format!("product {}", line.product_id)))?;

        if !product.is_sellable() {
            return Err(DomainError::validation(format!(
                "{} is no longer available",
                product.name
            )));
        }

        let selection = line.selection();
        product.require_complete_selection(selection)?;
        let available = product.available_stock(selection)?;
        if available < line.quantity {
            return Err(DomainError::validation(format!(
                "only {available} of {} left in stock",
                product.name
            )));
        }

        items.push(OrderItem {
            id: OrderItemId::new(),
            product_id: product.id,
            product_name: product.name.clone(),
            size_id: line.size_id,
            color_id: line.color_id,
            quantity: line.quantity,
            unit_price: product.price,
        });
    }

    Order::pending(OrderId::new(), store_id, customer, items, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storedesk_catalog::SizeVariant;
    use storedesk_core::Money;

    use crate::order::OrderStatus;

    fn product(store_id: StoreId, stock: u32) -> Product {
        Product::new(
            ProductId::new(),
            store_id,
            "Mug",
            Money::from_minor(1_250),
            stock,
            Utc::now(),
        )
    }

    fn line(product_id: ProductId, quantity: u32) -> CheckoutLine {
        CheckoutLine {
            product_id,
            size_id: None,
            color_id: None,
            quantity,
        }
    }

    #[test]
    fn checkout_prices_lines_from_catalog() {
        let store_id = StoreId::new();
        let mug = product(store_id, 10);
        let order = build_pending_order(
            store_id,
            &[line(mug.id, 3)],
            &[mug.clone()],
            CustomerDetails::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.amount, Money::from_minor(3_750));
        assert_eq!(order.items[0].product_name, "Mug");
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = build_pending_order(StoreId::new(), &[], &[], CustomerDetails::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn product_from_another_store_is_not_found() {
        let mug = product(StoreId::new(), 10);
        let err = build_pending_order(
            StoreId::new(),
            &[line(mug.id, 1)],
            &[mug],
            CustomerDetails::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn archived_or_short_stock_products_cannot_be_bought() {
        let store_id = StoreId::new();
        let mut archived = product(store_id, 10);
        archived.is_archived = true;
        assert!(build_pending_order(
            store_id,
            &[line(archived.id, 1)],
            &[archived],
            CustomerDetails::default(),
            Utc::now(),
        )
        .is_err());

        let scarce = product(store_id, 1);
        let err = build_pending_order(
            store_id,
            &[line(scarce.id, 2)],
            &[scarce],
            CustomerDetails::default(),
            Utc::now(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("only 1")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn products_with_sizes_need_a_size() {
        let store_id = StoreId::new();
        let size = SizeVariant {
            size_id: SizeId::new(),
            name: "L".into(),
            stock: 4,
        };
        let tee = product(store_id, 0).with_sizes(vec![size.clone()]);

        assert!(build_pending_order(
            store_id,
            &[line(tee.id, 1)],
            &[tee.clone()],
            CustomerDetails::default(),
            Utc::now(),
        )
        .is_err());

        let mut sized = line(tee.id, 2);
        sized.size_id = Some(size.size_id);
        let order = build_pending_order(
            store_id,
            &[sized],
            &[tee],
            CustomerDetails::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.items[0].size_id, Some(size.size_id));
    }
}
