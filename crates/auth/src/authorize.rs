use thiserror::Error;

use storedesk_catalog::Store;
use storedesk_core::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The store is missing or belongs to someone else. Both cases look the
    /// same to the caller so store ids cannot be probed.
    #[error("store not available to this user")]
    NotStoreOwner,
}

/// Authorize a user against a store: only its owner may manage it.
///
/// - No IO
/// - No panics
pub fn authorize_store<'a>(store: Option<&'a Store>, user: &UserId) -> Result<&'a Store, AuthzError> {
    match store {
        Some(store) if store.is_owned_by(user) => Ok(store),
        _ => Err(AuthzError::NotStoreOwner),
    }
}
