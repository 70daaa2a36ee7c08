//! Order lifecycle service.
//!
//! The single entry point for order status changes. The admin dashboard and
//! the payment webhook both go through here, so every change is planned by the
//! domain and committed by the repository with the same stale-status check.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use storedesk_core::{DomainError, OrderId, StoreId, UserId};
use storedesk_inventory::StockHistory;
use storedesk_sales::{CustomerDetails, Order, OrderStatus};

use crate::repository::{Repository, RepositoryError};

/// Actor recorded for changes made by the payment provider.
pub const PAYMENTS_ACTOR: &str = "payments";

/// How often a webhook-driven change is re-planned after losing a race.
const WEBHOOK_ATTEMPTS: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of an owner-initiated transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub order: Order,
    pub stock_changes: Vec<StockHistory>,
}

/// Result of a provider-initiated change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied(Order),
    /// Nothing to do (already applied, or the order is past this point).
    Skipped { order_id: OrderId, reason: String },
}

#[derive(Clone)]
pub struct OrderLifecycle {
    repository: Arc<dyn Repository>,
}

impl OrderLifecycle {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Move an order of `store_id` to `to` on behalf of its owner.
    ///
    /// A concurrent change between read and commit surfaces as a conflict;
    /// the caller decides whether to retry.
    #[instrument(skip(self), fields(store_id = %store_id, order_id = %order_id, to = %to, actor = %actor), err)]
    pub async fn transition(
        &self,
        store_id: StoreId,
        order_id: OrderId,
        to: OrderStatus,
        actor: &UserId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let order = self
            .repository
            .get_order(store_id, order_id)
            .await?
            .ok_or(LifecycleError::OrderNotFound(order_id))?;

        let plan = order.plan_transition(to, actor.as_str(), Utc::now())?;
        let (order, stock_changes) = self.repository.commit_transition(&plan).await?;

        info!(
            from = %plan.from,
            to = %plan.to,
            stock_changes = stock_changes.len(),
            "order status changed"
        );
        Ok(TransitionOutcome {
            order,
            stock_changes,
        })
    }

    /// Payment captured: PENDING → PAID, recording customer details.
    ///
    /// Idempotent: repeated deliveries of the same event are skipped.
    #[instrument(skip(self, customer), fields(order_id = %order_id), err)]
    pub async fn mark_paid(
        &self,
        order_id: OrderId,
        customer: Option<CustomerDetails>,
    ) -> Result<WebhookOutcome, LifecycleError> {
        self.apply_provider_change(order_id, OrderStatus::Paid, customer)
            .await
    }

    /// Payment refunded: the order is cancelled. Stock is not restored.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn cancel_refunded(&self, order_id: OrderId) -> Result<WebhookOutcome, LifecycleError> {
        self.apply_provider_change(order_id, OrderStatus::Cancelled, None)
            .await
    }

    async fn apply_provider_change(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        customer: Option<CustomerDetails>,
    ) -> Result<WebhookOutcome, LifecycleError> {
        let mut last_conflict = None;

        for _ in 0..WEBHOOK_ATTEMPTS {
            let order = self
                .repository
                .find_order(order_id)
                .await?
                .ok_or(LifecycleError::OrderNotFound(order_id))?;

            let already_there = match to {
                OrderStatus::Paid => order.is_paid(),
                _ => order.status == to,
            };
            if already_there || order.status.is_terminal() || !order.status.can_transition_to(to) {
                let reason = format!("order is {}", order.status);
                info!(status = %order.status, target = %to, "provider event skipped");
                return Ok(WebhookOutcome::Skipped { order_id, reason });
            }

            let mut plan = order.plan_transition(to, PAYMENTS_ACTOR, Utc::now())?;
            if let Some(customer) = customer.clone() {
                plan = plan.with_customer(customer);
            }

            match self.repository.commit_transition(&plan).await {
                Ok((order, _)) => {
                    info!(from = %plan.from, to = %plan.to, "order status changed by payment provider");
                    return Ok(WebhookOutcome::Applied(order));
                }
                Err(RepositoryError::Conflict(msg)) => {
                    warn!(%msg, "order changed concurrently; re-planning");
                    last_conflict = Some(RepositoryError::Conflict(msg));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_conflict
            .unwrap_or_else(|| RepositoryError::Conflict(format!("order {order_id} kept changing")))
            .into())
    }
}
