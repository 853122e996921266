//! Payment reconciliation service.

use common::{Money, OrderId, Payment, UserId};
use domain::DomainError;
use store::{NewPayment, Store};

use crate::error::PaymentError;
use crate::gateway::{GatewayOrder, RazorpayGateway};
use crate::signature;
use crate::webhook::WebhookEvent;

/// Gateway credentials, from the environment in deployment.
#[derive(Debug, Clone)]
pub struct RazorpayKeys {
    /// Public key id, returned to clients for checkout integration.
    pub key_id: String,
    /// Secret used to verify the synchronous verify-callback signature.
    pub key_secret: String,
    /// Secret used to verify webhook delivery signatures.
    pub webhook_secret: String,
}

/// Client input for a payment intent.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
}

/// A created payment intent: the local record, the remote gateway order,
/// and the public key the client checks out with.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub payment: Payment,
    pub gateway_order: GatewayOrder,
    pub key_id: String,
}

/// Reconciles local payment state against the gateway.
pub struct PaymentService<S, G> {
    store: S,
    gateway: G,
    keys: RazorpayKeys,
}

impl<S: Store, G: RazorpayGateway> PaymentService<S, G> {
    /// Creates a new payment service.
    pub fn new(store: S, gateway: G, keys: RazorpayKeys) -> Self {
        Self {
            store,
            gateway,
            keys,
        }
    }

    /// Creates a payment intent for an order.
    ///
    /// The caller must own the order, and an order with a Completed
    /// payment cannot be paid again. A remote gateway order is created
    /// and the local Payment row starts Pending against its reference.
    #[tracing::instrument(skip(self, req), fields(order_id = %req.order_id))]
    pub async fn create_intent(
        &self,
        buyer_id: UserId,
        req: IntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let order = self
            .store
            .get_order(req.order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(req.order_id))?;
        if order.buyer_id != buyer_id {
            return Err(DomainError::Forbidden {
                action: "pay for this order",
            }
            .into());
        }
        if self.store.has_completed_payment(order.id).await? {
            return Err(DomainError::AlreadyPaid { order_id: order.id }.into());
        }

        let gateway_order = self
            .gateway
            .create_order(req.amount, &req.currency, &order.order_number)
            .await?;

        let payment = self
            .store
            .insert_payment(NewPayment {
                order_id: order.id,
                buyer_id,
                amount: req.amount,
                method: "razorpay".to_string(),
                gateway_ref: gateway_order.id.clone(),
            })
            .await?;

        metrics::counter!("payment_intents_created_total").increment(1);
        tracing::info!(payment_id = %payment.id, gateway_ref = %payment.gateway_ref, "payment intent created");
        Ok(PaymentIntent {
            payment,
            gateway_order,
            key_id: self.keys.key_id.clone(),
        })
    }

    /// Verifies a client-supplied gateway signature and settles the
    /// payment.
    ///
    /// The signature is HMAC-SHA256 over `"{order_ref}|{payment_ref}"`
    /// under the key secret. A mismatch marks the payment Failed and
    /// surfaces `InvalidSignature`; a match completes the payment and
    /// moves the order to Processing in one transaction.
    #[tracing::instrument(skip(self, signature))]
    pub async fn verify(
        &self,
        buyer_id: UserId,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<Payment, PaymentError> {
        let payment = self
            .store
            .get_payment_by_gateway_ref(gateway_order_id)
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound {
                gateway_ref: gateway_order_id.to_string(),
            })?;
        if payment.buyer_id != buyer_id {
            return Err(DomainError::Forbidden {
                action: "verify this payment",
            }
            .into());
        }

        let message = format!("{gateway_order_id}|{gateway_payment_id}");
        if !signature::verify(&self.keys.key_secret, message.as_bytes(), signature) {
            self.store
                .fail_payment(payment.id, Some(gateway_payment_id))
                .await?;
            metrics::counter!("payments_failed_total").increment(1);
            tracing::warn!(payment_id = %payment.id, "payment signature mismatch");
            return Err(PaymentError::InvalidSignature);
        }

        let payment = self
            .store
            .complete_payment(payment.id, gateway_payment_id)
            .await?;
        metrics::counter!("payments_completed_total").increment(1);
        tracing::info!(payment_id = %payment.id, "payment verified");
        Ok(payment)
    }

    /// Handles an inbound gateway webhook.
    ///
    /// The signature is HMAC-SHA256 over the raw body under the webhook
    /// secret; missing or invalid signatures error. Past that point the
    /// handler never errors on unknown references or event types: the
    /// gateway retries failures, and an unknown reference would retry
    /// forever. Such events are logged and dropped.
    #[tracing::instrument(skip(self, raw_body, signature))]
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), PaymentError> {
        let signature = signature.ok_or(PaymentError::MissingSignature)?;
        if !signature::verify(&self.keys.webhook_secret, raw_body, signature) {
            return Err(PaymentError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(raw_body)?;
        let kind = event.event;
        let payload = event.payload;

        match kind.as_str() {
            "payment.authorized" => {
                let Some(entity) = payload.payment.map(|w| w.entity) else {
                    tracing::warn!(event = %kind, "webhook event carried no payment entity");
                    return Ok(());
                };
                match self
                    .store
                    .get_payment_by_gateway_ref(&entity.order_id)
                    .await?
                {
                    None => {
                        tracing::warn!(gateway_ref = %entity.order_id, "webhook for unknown payment reference, ignoring");
                    }
                    Some(payment) => {
                        self.store.complete_payment(payment.id, &entity.id).await?;
                        metrics::counter!("payments_completed_total").increment(1);
                        tracing::info!(payment_id = %payment.id, "payment authorized via webhook");
                    }
                }
            }
            "payment.failed" => {
                let Some(entity) = payload.payment.map(|w| w.entity) else {
                    tracing::warn!(event = %kind, "webhook event carried no payment entity");
                    return Ok(());
                };
                match self
                    .store
                    .get_payment_by_gateway_ref(&entity.order_id)
                    .await?
                {
                    None => {
                        tracing::warn!(gateway_ref = %entity.order_id, "webhook for unknown payment reference, ignoring");
                    }
                    Some(payment) => {
                        self.store.fail_payment(payment.id, Some(&entity.id)).await?;
                        metrics::counter!("payments_failed_total").increment(1);
                        tracing::info!(payment_id = %payment.id, "payment failed via webhook");
                    }
                }
            }
            "refund.created" => {
                let Some(entity) = payload.refund.map(|w| w.entity) else {
                    tracing::warn!(event = %kind, "webhook event carried no refund entity");
                    return Ok(());
                };
                match self
                    .store
                    .get_payment_by_transaction(&entity.payment_id)
                    .await?
                {
                    None => {
                        tracing::warn!(transaction_id = %entity.payment_id, "refund for unknown payment, ignoring");
                    }
                    Some(payment) => {
                        self.store.refund_payment(payment.id).await?;
                        tracing::info!(payment_id = %payment.id, "payment refunded via webhook");
                    }
                }
            }
            other => {
                tracing::debug!(event = other, "ignoring unhandled webhook event");
            }
        }
        Ok(())
    }
}
