use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    routing::get,
};
use chrono::Utc;

use storedesk_analytics::{DashboardOverview, daily_revenue_series};
use storedesk_core::StoreId;

use crate::app::dto::{self, RevenueResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require_store_owner;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stores/:store_id/analytics/revenue", get(revenue))
        .route("/stores/:store_id/analytics/overview", get(overview))
}

/// GET /api/stores/:store_id/analytics/revenue
///
/// One entry per UTC day from the store's creation until today.
pub async fn revenue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(store_id): Path<String>,
) -> Result<Json<RevenueResponse>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    let store = require_store_owner(&services, &principal, store_id).await?;

    let from = store.created_at.date_naive();
    let to = Utc::now().date_naive();
    let totals = services.repository.paid_order_totals_by_day(store_id).await?;

    Ok(Json(RevenueResponse {
        store_id,
        from,
        to,
        days: daily_revenue_series(from, to, totals),
    }))
}

pub async fn overview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(store_id): Path<String>,
) -> Result<Json<DashboardOverview>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    require_store_owner(&services, &principal, store_id).await?;

    let orders = services.repository.list_orders(store_id).await?;
    let products = services.repository.list_products(store_id).await?;
    Ok(Json(DashboardOverview::compute(
        &orders,
        &products,
        services.config.low_stock_threshold,
    )))
}
