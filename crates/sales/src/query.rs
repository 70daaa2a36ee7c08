//! Order list filtering and ordering for the dashboard.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use storedesk_core::DomainError;

use crate::order::{Order, OrderStatus};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSort {
    #[default]
    Newest,
    Oldest,
    AmountDesc,
    AmountAsc,
}

impl FromStr for OrderSort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "newest" => Ok(OrderSort::Newest),
            "oldest" => Ok(OrderSort::Oldest),
            "amount_desc" => Ok(OrderSort::AmountDesc),
            "amount_asc" => Ok(OrderSort::AmountAsc),
            other => Err(DomainError::validation(format!(
                "unknown sort '{other}'; expected newest, oldest, amount_desc or amount_asc"
            ))),
        }
    }
}

/// Free-text search, status filter and sort order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub sort: OrderSort,
}

impl OrderQuery {
    /// Search is case-insensitive; every whitespace-separated term must match
    /// the order id, a customer field or a product name.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }

        let Some(search) = self.search.as_deref() else {
            return true;
        };

        let haystack = searchable_text(order);
        search
            .split_whitespace()
            .map(str::to_lowercase)
            .all(|term| haystack.contains(&term))
    }

    pub fn apply(&self, orders: Vec<Order>) -> Vec<Order> {
        let mut out: Vec<Order> = orders.into_iter().filter(|o| self.matches(o)).collect();
        match self.sort {
            OrderSort::Newest => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            OrderSort::Oldest => out.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            OrderSort::AmountDesc => out.sort_by(|a, b| {
                b.amount
                    .cmp(&a.amount)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
            OrderSort::AmountAsc => out.sort_by(|a, b| {
                a.amount
                    .cmp(&b.amount)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }
        out
    }
}

fn searchable_text(order: &Order) -> String {
    let mut text = vec![
        order.id.to_string(),
        order.customer.name.clone(),
        order.customer.email.clone(),
        order.customer.phone.clone(),
        order.customer.address.clone(),
    ];
    text.extend(order.items.iter().map(|i| i.product_name.clone()));
    text.join("\n").to_lowercase()
}
