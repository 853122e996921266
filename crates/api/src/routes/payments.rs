//! Payment endpoints: intent creation, verification, gateway webhook.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use common::{Money, OrderId, Payment};
use payments::{IntentRequest, RazorpayGateway};
use serde::{Deserialize, Serialize};
use store::Store;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::routes::orders::AppState;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

// -- Request types --

#[derive(Deserialize)]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
    pub amount_paise: i64,
    pub currency: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub order_id: String,
    pub amount_paise: i64,
    pub method: String,
    pub gateway_ref: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct IntentResponse {
    pub payment: PaymentResponse,
    pub gateway_order_id: String,
    pub amount_paise: i64,
    pub currency: String,
    /// Public key for client-side checkout.
    pub key_id: String,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

impl PaymentResponse {
    pub(crate) fn from_payment(payment: &Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            order_id: payment.order_id.to_string(),
            amount_paise: payment.amount.paise(),
            method: payment.method.clone(),
            gateway_ref: payment.gateway_ref.clone(),
            status: payment.status.to_string(),
            transaction_id: payment.transaction_id.clone(),
            created_at: payment.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /payments/razorpay/create — create a payment intent for an order.
#[tracing::instrument(skip(state, req))]
pub async fn create_intent<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
    Json(req): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<IntentResponse>), ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let intent = state
        .payments
        .create_intent(
            principal.user_id,
            IntentRequest {
                order_id: OrderId::from_uuid(req.order_id),
                amount: Money::from_paise(req.amount_paise),
                currency: req.currency.unwrap_or_else(|| "INR".to_string()),
            },
        )
        .await?;

    let response = IntentResponse {
        payment: PaymentResponse::from_payment(&intent.payment),
        gateway_order_id: intent.gateway_order.id,
        amount_paise: intent.gateway_order.amount.paise(),
        currency: intent.gateway_order.currency,
        key_id: intent.key_id,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /payments/razorpay/verify — verify a client-supplied gateway
/// signature and settle the payment.
#[tracing::instrument(skip(state, req))]
pub async fn verify<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<PaymentResponse>, ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let payment = state
        .payments
        .verify(
            principal.user_id,
            &req.gateway_order_id,
            &req.gateway_payment_id,
            &req.signature,
        )
        .await?;
    Ok(Json(PaymentResponse::from_payment(&payment)))
}

/// POST /payments/razorpay/webhook — inbound gateway event.
///
/// No user auth; authenticity comes from the signature over the raw
/// body. Unknown references and event types are acknowledged with 200 so
/// the gateway does not retry them forever.
#[tracing::instrument(skip(state, headers, body))]
pub async fn webhook<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    state.payments.handle_webhook(&body, signature).await?;
    Ok(Json(WebhookResponse { status: "ok" }))
}
