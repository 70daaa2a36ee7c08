//! API-side store ownership guard.
//!
//! Every `/stores/:store_id/...` handler resolves the store through here
//! before touching any of its data.

use storedesk_auth::authorize_store;
use storedesk_catalog::Store;
use storedesk_core::StoreId;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Load `store_id` and check that the caller owns it.
///
/// A missing store and a foreign store are indistinguishable (405).
pub async fn require_store_owner(
    services: &AppServices,
    principal: &PrincipalContext,
    store_id: StoreId,
) -> Result<Store, ApiError> {
    let store = services.repository.get_store(store_id).await?;
    let store = authorize_store(store.as_ref(), principal.user_id())?;
    Ok(store.clone())
}
