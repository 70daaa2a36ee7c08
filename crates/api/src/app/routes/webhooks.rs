//! Provider callbacks: payment outcomes and identity user lifecycle.
//!
//! Signatures are verified upstream of this service; the payment endpoint can
//! additionally require a shared secret header.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::Extension,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};

use storedesk_auth::IdentityEvent;
use storedesk_infra::{PaymentEvent, WebhookOutcome};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub fn router() -> Router {
    Router::new()
        .route("/webhooks/payments", post(payments))
        .route("/webhooks/identity", post(identity))
}

/// POST /api/webhooks/payments
pub async fn payments(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, ApiError> {
    if let Some(expected) = services.config.payments_webhook_secret.as_deref() {
        let given = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if given != Some(expected) {
            warn!("payment webhook rejected: bad or missing shared secret");
            return Err(ApiError::Unauthorized);
        }
    }

    let outcome = match PaymentEvent::parse(&body)? {
        PaymentEvent::CheckoutCompleted { order_id, customer } => {
            services.lifecycle.mark_paid(order_id, customer).await?
        }
        PaymentEvent::Refunded { order_id } => services.lifecycle.cancel_refunded(order_id).await?,
        PaymentEvent::Ignored(kind) => {
            info!(%kind, "payment event ignored");
            return Ok(Json(json!({ "received": true, "outcome": "ignored" })));
        }
    };

    Ok(Json(match outcome {
        WebhookOutcome::Applied(order) => json!({
            "received": true,
            "outcome": "applied",
            "order_id": order.id,
            "status": order.status,
        }),
        WebhookOutcome::Skipped { order_id, reason } => json!({
            "received": true,
            "outcome": "skipped",
            "order_id": order_id,
            "reason": reason,
        }),
    }))
}

/// POST /api/webhooks/identity
pub async fn identity(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> Result<Json<JsonValue>, ApiError> {
    let outcome = match IdentityEvent::parse(&body, Utc::now())? {
        IdentityEvent::Upserted(user) => {
            services.repository.upsert_user(&user).await?;
            info!(user_id = %user.id, "user synced");
            "upserted"
        }
        IdentityEvent::Deleted(user_id) => {
            let removed = services.repository.delete_user(&user_id).await?;
            info!(user_id = %user_id, removed, "user deleted");
            "deleted"
        }
        IdentityEvent::Ignored(kind) => {
            info!(%kind, "identity event ignored");
            "ignored"
        }
    };
    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
