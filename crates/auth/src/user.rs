//! Local mirror of identity-provider users.
//!
//! The provider owns the accounts; webhooks keep this table in sync so stores
//! can reference their owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storedesk_core::{DomainError, DomainResult, Entity, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A user-lifecycle notification from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// Created or updated; the payload carries the full profile.
    Upserted(User),
    Deleted(UserId),
    /// Any other event type; acknowledged and dropped.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    id: Option<String>,
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    primary_email_address_id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeletedPayload {
    id: String,
}

impl UserPayload {
    fn primary_email(&self) -> Option<&str> {
        let primary = self.primary_email_address_id.as_deref();
        self.email_addresses
            .iter()
            .find(|e| primary.is_some() && e.id.as_deref() == primary)
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.as_str())
    }

    fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn malformed(kind: &str, err: impl core::fmt::Display) -> DomainError {
    DomainError::validation(format!("malformed {kind} payload: {err}"))
}

impl IdentityEvent {
    /// Parse a webhook body. `at` stamps created/updated times.
    pub fn parse(body: &[u8], at: DateTime<Utc>) -> DomainResult<Self> {
        let envelope: Envelope =
            serde_json::from_slice(body).map_err(|e| malformed("identity event", e))?;

        match envelope.kind.as_str() {
            "user.created" | "user.updated" => {
                let payload: UserPayload = serde_json::from_value(envelope.data)
                    .map_err(|e| malformed(&envelope.kind, e))?;
                let email = payload
                    .primary_email()
                    .map(str::to_string)
                    .ok_or_else(|| DomainError::validation("user has no email address"))?;
                Ok(IdentityEvent::Upserted(User {
                    id: UserId::new(payload.id.clone())?,
                    email,
                    name: payload.display_name(),
                    image_url: payload.image_url.clone(),
                    created_at: at,
                    updated_at: at,
                }))
            }
            "user.deleted" => {
                let payload: DeletedPayload = serde_json::from_value(envelope.data)
                    .map_err(|e| malformed(&envelope.kind, e))?;
                Ok(IdentityEvent::Deleted(UserId::new(payload.id)?))
            }
            other => Ok(IdentityEvent::Ignored(other.to_string())),
        }
    }
}
