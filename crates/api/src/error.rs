//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use payments::PaymentError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No resolved principal on the request.
    Unauthorized,
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Payment reconciliation error.
    Payment(PaymentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Internal(msg) => internal(&msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Logs the detail server-side and returns a generic message; internals
/// never leak into response bodies.
fn internal(detail: &str) -> (StatusCode, String) {
    tracing::error!(error = %detail, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::ProductNotFound(_)
        | DomainError::OrderNotFound(_)
        | DomainError::GroupOrderNotFound(_)
        | DomainError::UserNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Forbidden { .. } => (StatusCode::FORBIDDEN, err.to_string()),
        DomainError::InvalidState { .. }
        | DomainError::InsufficientStock { .. }
        | DomainError::AlreadyMember { .. }
        | DomainError::AlreadyPaid { .. }
        | DomainError::EmptyOrder
        | DomainError::InvalidQuantity { .. }
        | DomainError::DeadlinePassed { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Store(StoreError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        DomainError::Store(_) => internal(&err.to_string()),
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::MissingSignature | PaymentError::InvalidSignature => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        PaymentError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        PaymentError::PaymentNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        PaymentError::Gateway(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        PaymentError::Domain(inner) => domain_error_to_response(inner),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}
