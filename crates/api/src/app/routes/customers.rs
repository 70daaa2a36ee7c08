use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    routing::get,
};

use storedesk_core::StoreId;
use storedesk_sales::{CustomerSummary, summarize_customers};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require_store_owner;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/stores/:store_id/customers", get(list_customers))
}

/// Customers derived from the store's orders, biggest spenders first.
pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(store_id): Path<String>,
) -> Result<Json<Vec<CustomerSummary>>, ApiError> {
    let store_id: StoreId = dto::parse_id(&store_id)?;
    require_store_owner(&services, &principal, store_id).await?;

    let orders = services.repository.list_orders(store_id).await?;
    Ok(Json(summarize_customers(&orders)))
}
