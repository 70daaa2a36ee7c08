use serde::{Deserialize, Serialize};

use storedesk_catalog::Product;
use storedesk_core::{Money, ProductId};
use storedesk_sales::Order;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockProduct {
    pub product_id: ProductId,
    pub name: String,
    pub stock: u32,
}

/// Headline numbers for a store's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub total_revenue: Money,
    pub sales_count: usize,
    pub stock_count: u64,
    pub low_stock: Vec<LowStockProduct>,
}

impl DashboardOverview {
    /// Archived products are left out of stock figures.
    pub fn compute(orders: &[Order], products: &[Product], low_stock_threshold: u32) -> Self {
        let paid: Vec<&Order> = orders.iter().filter(|o| o.is_paid()).collect();
        let active = products.iter().filter(|p| p.is_sellable());

        let mut stock_count = 0u64;
        let mut low_stock = Vec::new();
        for product in active {
            let stock = product.displayed_stock();
            stock_count = stock_count.saturating_add(u64::from(stock));
            if stock < low_stock_threshold {
                low_stock.push(LowStockProduct {
                    product_id: product.id,
                    name: product.name.clone(),
                    stock,
                });
            }
        }
        low_stock.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));

        Self {
            total_revenue: paid.iter().map(|o| o.amount).sum(),
            sales_count: paid.len(),
            stock_count,
            low_stock,
        }
    }
}
