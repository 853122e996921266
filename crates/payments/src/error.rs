//! Payment error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors that can occur during payment reconciliation.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The signature header was absent from a webhook call.
    #[error("missing webhook signature header")]
    MissingSignature,

    /// Signature verification failed.
    #[error("invalid payment signature")]
    InvalidSignature,

    /// No payment exists for the given gateway reference.
    #[error("no payment found for gateway reference {gateway_ref}")]
    PaymentNotFound { gateway_ref: String },

    /// The payment gateway rejected or failed a call.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// The webhook body was not a parseable event.
    #[error("unparseable webhook payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Domain error.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<StoreError> for PaymentError {
    fn from(e: StoreError) -> Self {
        PaymentError::Domain(DomainError::from(e))
    }
}

impl From<GatewayError> for PaymentError {
    fn from(e: GatewayError) -> Self {
        PaymentError::Gateway(e.to_string())
    }
}
