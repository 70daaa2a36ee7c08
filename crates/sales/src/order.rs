use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storedesk_catalog::VariantSelection;
use storedesk_core::{
    ColorId, DomainError, DomainResult, Entity, Money, OrderId, OrderItemId, ProductId, SizeId,
    StoreId, Timestamped,
};
use storedesk_inventory::StockReason;

/// Order status lifecycle.
///
/// Forward-only along `Pending → Paid → Shipped → Delivered` (steps may be
/// skipped); `Cancelled` is reachable from any non-terminal status. `Delivered`
/// and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Position on the fulfilment path; `None` for `Cancelled`.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Paid => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses that imply the payment was captured.
    pub fn is_paid(self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }

    /// Statuses in which the ordered goods have left the stock.
    pub fn commits_stock(self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "unknown order status '{wanted}'; expected one of PENDING, PAID, SHIPPED, DELIVERED, CANCELLED"
                ))
            })
    }
}

/// Contact and shipping details captured at checkout/payment time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl CustomerDetails {
    /// Overlay the non-blank fields of `other`; blank incoming fields keep the
    /// current value.
    pub fn merged_with(&self, other: &CustomerDetails) -> CustomerDetails {
        fn pick(current: &str, incoming: &str) -> String {
            if incoming.trim().is_empty() {
                current.to_string()
            } else {
                incoming.trim().to_string()
            }
        }
        CustomerDetails {
            name: pick(&self.name, &other.name),
            email: pick(&self.email, &other.email),
            phone: pick(&self.phone, &other.phone),
            address: pick(&self.address, &other.address),
        }
    }
}

/// Order line: product, optional variants, quantity and unit price at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    /// Name at order time, kept for display and search after catalog edits.
    pub product_name: String,
    pub size_id: Option<SizeId>,
    pub color_id: Option<ColorId>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn selection(&self) -> VariantSelection {
        VariantSelection {
            size_id: self.size_id,
            color_id: self.color_id,
        }
    }

    pub fn line_total(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// One planned stock decrement, produced for each line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDecrement {
    pub item_id: OrderItemId,
    pub product_id: ProductId,
    pub selection: VariantSelection,
    pub quantity: u32,
}

/// A validated, not yet committed status change.
///
/// Storage commits it atomically and only if the stored status still equals
/// `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
    pub decrements: Vec<LineDecrement>,
    /// Customer details reported alongside the change (payment provider).
    pub customer: Option<CustomerDetails>,
}

impl StatusTransition {
    pub fn with_customer(mut self, customer: CustomerDetails) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn stock_reason(&self) -> StockReason {
        StockReason::order_fulfilment(self.order_id, self.to.as_str())
    }
}

/// Order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub store_id: StoreId,
    pub status: OrderStatus,
    pub customer: CustomerDetails,
    pub items: Vec<OrderItem>,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// A new order awaiting payment.
    pub fn pending(
        id: OrderId,
        store_id: StoreId,
        customer: CustomerDetails,
        items: Vec<OrderItem>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("an order needs at least one item"));
        }

        let mut amount = Money::ZERO;
        for item in &items {
            if item.quantity == 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            amount = amount.checked_add(item.line_total()?)?;
        }

        Ok(Self {
            id,
            store_id,
            status: OrderStatus::Pending,
            customer,
            items,
            amount,
            created_at: at,
            updated_at: at,
            paid_at: None,
        })
    }

    pub fn is_paid(&self) -> bool {
        self.status.is_paid()
    }

    /// Calendar day (UTC) the order counts towards in revenue reports.
    pub fn revenue_date(&self) -> NaiveDate {
        self.paid_at.unwrap_or(self.created_at).date_naive()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .map(|i| i.quantity)
            .fold(0u32, u32::saturating_add)
    }

    /// Decide a status change without touching state.
    ///
    /// Every move into `Shipped` or `Delivered` plans one decrement per line,
    /// including `Shipped` to `Delivered`.
    pub fn plan_transition(
        &self,
        to: OrderStatus,
        actor: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<StatusTransition> {
        let from = self.status;
        if from == to {
            return Err(DomainError::conflict(format!("order is already {from}")));
        }
        if from.is_terminal() {
            return Err(DomainError::invariant(format!(
                "order is {from}; no further status changes are accepted"
            )));
        }
        if !from.can_transition_to(to) {
            return Err(DomainError::invariant(format!(
                "cannot move order from {from} back to {to}"
            )));
        }

        let decrements = if to.commits_stock() {
            self.items
                .iter()
                .map(|item| LineDecrement {
                    item_id: item.id,
                    product_id: item.product_id,
                    selection: item.selection(),
                    quantity: item.quantity,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(StatusTransition {
            order_id: self.id,
            store_id: self.store_id,
            from,
            to,
            actor: actor.into(),
            occurred_at: at,
            decrements,
            customer: None,
        })
    }

    /// Evolve in-memory state from a committed transition.
    pub fn apply_transition(&mut self, transition: &StatusTransition) {
        self.status = transition.to;
        self.updated_at = transition.occurred_at;
        if transition.to == OrderStatus::Paid && self.paid_at.is_none() {
            self.paid_at = Some(transition.occurred_at);
        }
        if let Some(customer) = &transition.customer {
            self.customer = self.customer.merged_with(customer);
        }
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Timestamped for Order {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
