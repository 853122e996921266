//! Webhook event envelope, matching the gateway's wire shape.

use serde::Deserialize;

/// An inbound webhook event.
///
/// The gateway's event set evolves; only the fields this core dispatches
/// on are modeled, and unknown event types are tolerated upstream.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// Event type, e.g. `payment.authorized`.
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

/// Entity payloads carried by an event.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<EntityWrapper<PaymentEntity>>,
    pub refund: Option<EntityWrapper<RefundEntity>>,
}

/// The gateway nests every entity under an `entity` key.
#[derive(Debug, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

/// Payment entity fields used for reconciliation.
#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    /// Gateway payment reference (`pay_...`).
    pub id: String,
    /// Gateway order reference (`order_...`) the payment belongs to.
    pub order_id: String,
}

/// Refund entity fields used for reconciliation.
#[derive(Debug, Deserialize)]
pub struct RefundEntity {
    /// Gateway refund reference (`rfnd_...`).
    pub id: String,
    /// Gateway payment reference the refund applies to.
    pub payment_id: String,
}
