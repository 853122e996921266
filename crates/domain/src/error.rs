//! Domain error types.

use chrono::{DateTime, Utc};
use common::{GroupOrderId, OrderId, ProductId, UserId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during order workflows.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Product not found.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Group order not found.
    #[error("group order not found: {0}")]
    GroupOrderNotFound(GroupOrderId),

    /// No user registered under the given email.
    #[error("no user found for email {email}")]
    UserNotFound { email: String },

    /// Caller is not permitted to perform the action.
    #[error("not permitted to {action}")]
    Forbidden { action: &'static str },

    /// The entity is not in a state that permits the action.
    #[error("{entity} is {current}, cannot {action}")]
    InvalidState {
        entity: &'static str,
        current: String,
        action: &'static str,
    },

    /// A reservation asked for more units than are available.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The user already belongs to the group order.
    #[error("user {user_id} is already a member of group order {group_order_id}")]
    AlreadyMember {
        group_order_id: GroupOrderId,
        user_id: UserId,
    },

    /// The order already has a completed payment.
    #[error("order {order_id} is already paid")]
    AlreadyPaid { order_id: OrderId },

    /// An order must contain at least one item.
    #[error("order has no items")]
    EmptyOrder,

    /// Item quantity must be positive.
    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Group order deadline must be in the future.
    #[error("deadline {deadline} is in the past")]
    DeadlinePassed { deadline: DateTime<Utc> },

    /// An error occurred in the store.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::DuplicateMember {
                group_order_id,
                user_id,
            } => DomainError::AlreadyMember {
                group_order_id,
                user_id,
            },
            StoreError::StateConflict {
                entity,
                actual,
                action,
                ..
            } => DomainError::InvalidState {
                entity,
                current: actual,
                action,
            },
            other => DomainError::Store(other),
        }
    }
}
