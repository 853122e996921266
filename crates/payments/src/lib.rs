//! Payment reconciliation against a Razorpay-style gateway.
//!
//! A payment intent ties a local Payment row to a remote gateway order.
//! The payment then reaches a terminal state exactly once, driven either
//! by the client's synchronous verify call or by an asynchronous signed
//! webhook; replayed events are skipped, never re-applied.

mod error;
mod gateway;
mod service;
pub mod signature;
mod webhook;

pub use error::PaymentError;
pub use gateway::{GatewayError, GatewayOrder, InMemoryGateway, RazorpayGateway};
pub use service::{IntentRequest, PaymentIntent, PaymentService, RazorpayKeys};
pub use webhook::{EntityWrapper, PaymentEntity, RefundEntity, WebhookEvent, WebhookPayload};
