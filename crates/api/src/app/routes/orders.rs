use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use tracing::info;

use storedesk_core::{OrderId, StoreId};
use storedesk_sales::{Order, OrderStatus};

use crate::app::dto::{self, ListOrdersParams, OrderStatusResponse, UpdateOrderStatusRequest};
use crate::app::errors::ApiError;
use crate::app::services::{self, AppServices};
use crate::authz::require_store_owner;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stores/:store_id/orders", get(list_orders))
        .route("/stores/:store_id/orders/stream", get(stream_orders))
        .route(
            "/stores/:store_id/orders/:order_id",
            get(get_order).delete(delete_order),
        )
        .route(
            "/stores/:store_id/orders/:order_id/status",
            patch(update_order_status),
        )
}

/// GET /api/stores/:store_id/orders?search=&status=&sort=
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(store_id): Path<String>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    require_store_owner(&services, &principal, store_id).await?;

    let query = params.into_query()?;
    let orders = services.repository.list_orders(store_id).await?;
    Ok(Json(query.apply(orders)))
}

/// GET /api/stores/:store_id/orders/stream
///
/// Server-sent events; each `orders` event carries the full list.
pub async fn stream_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(store_id): Path<String>,
) -> Result<Response, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    require_store_owner(&services, &principal, store_id).await?;
    Ok(services::order_sse_stream(services, store_id).into_response())
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((store_id, order_id)): Path<(String, String)>,
) -> Result<Json<Order>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    let order_id: OrderId = dto::parse_id(&order_id)?;
    require_store_owner(&services, &principal, store_id).await?;

    services
        .repository
        .get_order(store_id, order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("order {order_id} not found")))
}

/// PATCH /api/stores/:store_id/orders/:order_id/status
pub async fn update_order_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((store_id, order_id)): Path<(String, String)>,
    Json(body): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    let order_id: OrderId = dto::parse_id(&order_id)?;
    let status: OrderStatus = body.status.parse()?;
    require_store_owner(&services, &principal, store_id).await?;

    let outcome = services
        .lifecycle
        .transition(store_id, order_id, status, principal.user_id())
        .await?;

    Ok(Json(OrderStatusResponse {
        order: outcome.order,
        stock_changes: outcome.stock_changes,
    }))
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((store_id, order_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    let order_id: OrderId = dto::parse_id(&order_id)?;
    require_store_owner(&services, &principal, store_id).await?;

    if !services.repository.delete_order(store_id, order_id).await? {
        return Err(ApiError::NotFound(format!("order {order_id} not found")));
    }
    info!(store_id = %store_id, order_id = %order_id, "order deleted");
    Ok(StatusCode::NO_CONTENT)
}
