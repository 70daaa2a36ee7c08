use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use storedesk_analytics::DailyRevenue;
use storedesk_core::{ColorId, DomainError, OrderId, SizeId, StoreId};
use storedesk_infra::CheckoutSession;
use storedesk_inventory::StockHistory;
use storedesk_sales::{CheckoutLine, CustomerDetails, Order, OrderQuery, OrderStatus};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

/// Status arrives as a raw string so unknown values map to 400, not a
/// deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
}

impl ListOrdersParams {
    pub fn into_query(self) -> Result<OrderQuery, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<OrderStatus>()?),
        };
        Ok(OrderQuery {
            search: self.search.filter(|s| !s.trim().is_empty()),
            status,
            sort: self.sort.as_deref().unwrap_or_default().parse()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockHistoryParams {
    pub product_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    #[serde(default)]
    pub size_id: Option<SizeId>,
    #[serde(default)]
    pub color_id: Option<ColorId>,
    pub stock: u32,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    #[serde(default)]
    pub customer: CustomerDetails,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub order: Order,
    pub stock_changes: Vec<StockHistory>,
}

#[derive(Debug, Serialize)]
pub struct RevenueResponse {
    pub store_id: StoreId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<DailyRevenue>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub session: CheckoutSession,
}

// -------------------------
// Helpers
// -------------------------

/// Parse an id from a path or query segment.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse::<T>().map_err(ApiError::from)
}
