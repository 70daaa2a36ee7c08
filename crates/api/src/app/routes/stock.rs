use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{get, patch},
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tracing::info;

use storedesk_catalog::VariantSelection;
use storedesk_core::{ProductId, StoreId};
use storedesk_infra::StockAdjustment;
use storedesk_inventory::{StockHistory, StockReason};

use crate::app::dto::{self, SetStockRequest, StockHistoryParams};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require_store_owner;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stores/:store_id/stock-history", get(list_stock_history))
        .route(
            "/stores/:store_id/products/:product_id/stock",
            patch(set_product_stock),
        )
}

/// GET /api/stores/:store_id/stock-history?product_id=
///
/// Newest first.
pub async fn list_stock_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(store_id): Path<String>,
    Query(params): Query<StockHistoryParams>,
) -> Result<Json<Vec<StockHistory>>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    let product_id = match params.product_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(dto::parse_id::<ProductId>(raw)?),
    };
    require_store_owner(&services, &principal, store_id).await?;

    let rows = services
        .repository
        .list_stock_history(store_id, product_id)
        .await?;
    Ok(Json(rows))
}

/// PATCH /api/stores/:store_id/products/:product_id/stock
///
/// Sets the base stock, or one variant's stock when a size or colour is given.
pub async fn set_product_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((store_id, product_id)): Path<(String, String)>,
    Json(body): Json<SetStockRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    let product_id: ProductId = dto::parse_id(&product_id)?;
    require_store_owner(&services, &principal, store_id).await?;

    let adjustment = StockAdjustment {
        product_id,
        selection: VariantSelection {
            size_id: body.size_id,
            color_id: body.color_id,
        },
        stock: body.stock,
        reason: StockReason::manual(body.note),
        actor: principal.user_id().to_string(),
        at: Utc::now(),
    };
    let (product, entry) = services
        .repository
        .set_product_stock(store_id, &adjustment)
        .await?;

    info!(
        store_id = %store_id,
        product_id = %product_id,
        old_stock = entry.old_stock,
        new_stock = entry.new_stock,
        "stock adjusted"
    );
    Ok(Json(json!({
        "product": product,
        "displayed_stock": product.displayed_stock(),
        "entry": entry,
    })))
}
