//! Customer list derived from orders.
//!
//! There is no customer table; a customer is whoever placed orders under the
//! same email (case-insensitive) or, lacking an email, the same phone number.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storedesk_core::Money;

use crate::order::Order;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub key: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub order_count: usize,
    /// Sum over paid orders only.
    pub total_spent: Money,
    pub last_order_at: DateTime<Utc>,
}

fn customer_key(order: &Order) -> Option<String> {
    let email = order.customer.email.trim();
    if !email.is_empty() {
        return Some(email.to_lowercase());
    }
    let phone = order.customer.phone.trim();
    (!phone.is_empty()).then(|| phone.to_string())
}

/// Group orders by customer, biggest spenders first.
///
/// Contact details come from the customer's most recent order. Orders with
/// neither email nor phone are left out.
pub fn summarize_customers(orders: &[Order]) -> Vec<CustomerSummary> {
    let mut by_key: HashMap<String, CustomerSummary> = HashMap::new();

    for order in orders {
        let Some(key) = customer_key(order) else {
            continue;
        };
        let paid = if order.is_paid() { order.amount } else { Money::ZERO };

        let entry = by_key.entry(key.clone()).or_insert_with(|| CustomerSummary {
            key,
            name: order.customer.name.clone(),
            email: order.customer.email.clone(),
            phone: order.customer.phone.clone(),
            order_count: 0,
            total_spent: Money::ZERO,
            last_order_at: order.created_at,
        });

        entry.order_count += 1;
        entry.total_spent = [entry.total_spent, paid].into_iter().sum();
        if order.created_at >= entry.last_order_at {
            entry.last_order_at = order.created_at;
            entry.name = order.customer.name.clone();
            entry.email = order.customer.email.clone();
            entry.phone = order.customer.phone.clone();
        }
    }

    let mut out: Vec<CustomerSummary> = by_key.into_values().collect();
    out.sort_by(|a, b| {
        b.total_spent
            .cmp(&a.total_spent)
            .then_with(|| b.last_order_at.cmp(&a.last_order_at))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use storedesk_core::{OrderId, OrderItemId, ProductId, StoreId};

    use crate::order::{CustomerDetails, OrderItem, OrderStatus};

    fn order(email: &str, phone: &str, amount: u64, paid: bool, age_days: i64) -> Order {
        let at = Utc::now() - Duration::days(age_days);
        let mut order = Order::pending(
            OrderId::new(),
            StoreId::new(),
            CustomerDetails {
                name: format!("{email}{phone}"),
                email: email.into(),
                phone: phone.into(),
                address: String::new(),
            },
            vec![OrderItem {
                id: OrderItemId::new(),
                product_id: ProductId::new(),
                product_name: "Mug".into(),
                size_id: None,
                color_id: None,
                quantity: 1,
                unit_price: Money::from_minor(amount),
            }],
            at,
        )
        .unwrap();
        if paid {
            let t = order.plan_transition(OrderStatus::Paid, "payments", at).unwrap();
            order.apply_transition(&t);
        }
        order
    }

    #[test]
    fn orders_group_by_email_ignoring_case() {
        let orders = vec![
            order("Ann@Example.com", "", 1_000, true, 3),
            order("ann@example.com", "", 500, true, 1),
        ];
        let customers = summarize_customers(&orders);
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].order_count, 2);
        assert_eq!(customers[0].total_spent, Money::from_minor(1_500));
        assert_eq!(customers[0].email, "ann@example.com");
    }

    #[test]
    fn unpaid_orders_count_but_do_not_add_to_spend() {
        let customers = summarize_customers(&[order("", "555-1", 900, false, 0)]);
        assert_eq!(customers[0].key, "555-1");
        assert_eq!(customers[0].order_count, 1);
        assert!(customers[0].total_spent.is_zero());
    }

    #[test]
    fn anonymous_orders_are_skipped_and_spenders_sort_first() {
        let customers = summarize_customers(&[
            order("", "", 100, true, 0),
            order("a@x.io", "", 100, true, 0),
            order("b@x.io", "", 300, true, 0),
        ]);
        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].email, "b@x.io");
    }
}
