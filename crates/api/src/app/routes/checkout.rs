use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    routing::post,
};
use chrono::Utc;
use tracing::info;

use storedesk_core::StoreId;
use storedesk_sales::build_pending_order;

use crate::app::dto::{self, CheckoutRequest, CheckoutResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/storefront/:store_id/checkout", post(checkout))
}

/// POST /api/storefront/:store_id/checkout
///
/// Records a PENDING order and returns the hosted payment page to send the
/// buyer to. Stock is only checked here; it is consumed when the order ships.
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Path(store_id): Path<String>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    let store = services
        .repository
        .get_store(store_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("store {store_id} not found")))?;

    let products = services.repository.list_products(store_id).await?;
    let order = build_pending_order(store_id, &body.items, &products, body.customer, Utc::now())?;

    // The order is only recorded once the gateway has a session for it.
    let session = services
        .payments
        .create_checkout_session(&store, &order)
        .await?;
    services.repository.insert_order(&order).await?;

    info!(
        store_id = %store_id,
        order_id = %order.id,
        amount = order.amount.minor_units(),
        "checkout session created"
    );
    Ok(Json(CheckoutResponse {
        order_id: order.id,
        session,
    }))
}
