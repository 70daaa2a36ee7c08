use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storedesk_core::{DomainError, DomainResult, Entity, StoreId, UserId};

/// A store: the tenant boundary. Every catalog and order record belongs to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn new(
        id: StoreId,
        name: impl Into<String>,
        owner_id: UserId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("store name cannot be empty"));
        }
        Ok(Self {
            id,
            name: name.trim().to_string(),
            owner_id,
            created_at,
        })
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }
}

impl Entity for Store {
    type Id = StoreId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
