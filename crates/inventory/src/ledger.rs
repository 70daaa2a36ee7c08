//! Stock ledger: append-only history of stock changes.
//!
//! Rows are written whenever a stock record changes and are never updated or
//! deleted afterwards. They exist for display only; current stock is always read
//! from the catalog, never recomputed from the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storedesk_core::{ColorId, Entity, OrderId, ProductId, SizeId, StockEntryId, StoreId};

use crate::stock::StockChange;

/// Why a stock record changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockReason {
    /// An order entered a fulfilment status and consumed stock.
    OrderFulfilment { order_id: OrderId, status: String },
    /// An owner set the stock by hand.
    ManualAdjustment { note: Option<String> },
}

impl StockReason {
    pub fn order_fulfilment(order_id: OrderId, status: impl Into<String>) -> Self {
        Self::OrderFulfilment {
            order_id,
            status: status.into(),
        }
    }

    pub fn manual(note: Option<String>) -> Self {
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Self::ManualAdjustment { note }
    }

    /// Human-readable reason stored on the ledger row.
    pub fn describe(&self) -> String {
        match self {
            StockReason::OrderFulfilment { order_id, status } => {
                format!("Order {order_id} marked {status}")
            }
            StockReason::ManualAdjustment { note: Some(note) } => {
                format!("Manual adjustment: {note}")
            }
            StockReason::ManualAdjustment { note: None } => "Manual adjustment".to_string(),
        }
    }
}

/// One immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistory {
    pub id: StockEntryId,
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub size_id: Option<SizeId>,
    pub color_id: Option<ColorId>,
    pub old_stock: u32,
    pub new_stock: u32,
    pub reason: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl StockHistory {
    /// Build the ledger row for an applied change.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        store_id: StoreId,
        product_id: ProductId,
        size_id: Option<SizeId>,
        color_id: Option<ColorId>,
        change: StockChange,
        reason: &StockReason,
        actor: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StockEntryId::new(),
            store_id,
            product_id,
            size_id,
            color_id,
            old_stock: change.old,
            new_stock: change.new,
            reason: reason.describe(),
            actor: actor.into(),
            created_at: at,
        }
    }

    pub fn delta(&self) -> i64 {
        i64::from(self.new_stock) - i64::from(self.old_stock)
    }
}

impl Entity for StockHistory {
    type Id = StockEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
