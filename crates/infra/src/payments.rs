//! Payment provider integration.
//!
//! Checkout hands the buyer over to a hosted payment page; the provider later
//! reports the outcome through a webhook. Signature verification of those
//! webhooks happens upstream.

use serde::Deserialize;
use thiserror::Error;

use storedesk_catalog::Store;
use storedesk_core::OrderId;
use storedesk_sales::{CustomerDetails, Order};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("malformed payment event: {0}")]
    Malformed(String),

    #[error("{0} event carries no order_id metadata")]
    MissingOrderId(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),
}

/// Where to send the buyer to pay.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CheckoutSession {
    pub url: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        store: &Store,
        order: &Order,
    ) -> Result<CheckoutSession, PaymentError>;
}

/// Gateway whose sessions are plain links to a hosted payment page keyed by
/// order id.
#[derive(Debug, Clone)]
pub struct HostedCheckoutGateway {
    checkout_base_url: String,
    storefront_url: String,
}

impl HostedCheckoutGateway {
    pub fn new(checkout_base_url: impl Into<String>, storefront_url: impl Into<String>) -> Self {
        Self {
            checkout_base_url: checkout_base_url.into().trim_end_matches('/').to_string(),
            storefront_url: storefront_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for HostedCheckoutGateway {
    async fn create_checkout_session(
        &self,
        store: &Store,
        order: &Order,
    ) -> Result<CheckoutSession, PaymentError> {
        if order.amount.is_zero() {
            return Err(PaymentError::Gateway("cannot charge a zero amount".to_string()));
        }
        Ok(CheckoutSession {
            url: format!(
                "{}/{}?store_id={}&amount={}",
                self.checkout_base_url,
                order.id,
                store.id,
                order.amount.minor_units()
            ),
            success_url: format!("{}/cart?success=1&order_id={}", self.storefront_url, order.id),
            cancel_url: format!("{}/cart?canceled=1", self.storefront_url),
        })
    }
}

/// A payment notification relevant to order state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted {
        order_id: OrderId,
        customer: Option<CustomerDetails>,
    },
    Refunded {
        order_id: OrderId,
    },
    /// Any other event type; acknowledged and dropped.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    #[serde(default)]
    object: EventObject,
}

#[derive(Debug, Default, Deserialize)]
struct EventObject {
    #[serde(default)]
    metadata: Metadata,
    customer_details: Option<CustomerPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerPayload {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<AddressPayload>,
}

#[derive(Debug, Deserialize)]
struct AddressPayload {
    line1: Option<String>,
    line2: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
}

impl AddressPayload {
    fn single_line(&self) -> String {
        [
            &self.line1,
            &self.line2,
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        ]
        .into_iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

impl From<CustomerPayload> for CustomerDetails {
    fn from(payload: CustomerPayload) -> Self {
        CustomerDetails {
            name: payload.name.unwrap_or_default(),
            email: payload.email.unwrap_or_default(),
            phone: payload.phone.unwrap_or_default(),
            address: payload
                .address
                .map(|a| a.single_line())
                .unwrap_or_default(),
        }
    }
}

impl PaymentEvent {
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        let envelope: Envelope =
            serde_json::from_slice(body).map_err(|e| PaymentError::Malformed(e.to_string()))?;

        let order_id = |kind: &str, metadata: &Metadata| -> Result<OrderId, PaymentError> {
            let raw = metadata
                .order_id
                .as_deref()
                .ok_or_else(|| PaymentError::MissingOrderId(kind.to_string()))?;
            raw.parse::<OrderId>()
                .map_err(|e| PaymentError::Malformed(e.to_string()))
        };

        match envelope.kind.as_str() {
            "checkout.session.completed" => {
                let object = envelope.data.object;
                Ok(PaymentEvent::CheckoutCompleted {
                    order_id: order_id(&envelope.kind, &object.metadata)?,
                    customer: object.customer_details.map(CustomerDetails::from),
                })
            }
            "charge.refunded" => Ok(PaymentEvent::Refunded {
                order_id: order_id(&envelope.kind, &envelope.data.object.metadata)?,
            }),
            other => Ok(PaymentEvent::Ignored(other.to_string())),
        }
    }
}
