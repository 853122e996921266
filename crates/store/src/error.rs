//! Storage error types.

use common::{GroupOrderId, ProductId, UserId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error occurred in the underlying database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A reservation asked for more units than are available.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The (group order, user) membership pair already exists.
    #[error("user {user_id} already belongs to group order {group_order_id}")]
    DuplicateMember {
        group_order_id: GroupOrderId,
        user_id: UserId,
    },

    /// A conditional status update found the entity in a different state.
    #[error("{entity} {id} is {actual}, cannot {action}")]
    StateConflict {
        entity: &'static str,
        id: String,
        actual: String,
        action: &'static str,
    },

    /// A stored status column held a value outside the closed enumeration.
    #[error("unrecognized {field} value in storage: {value}")]
    UnknownStatus { field: &'static str, value: String },
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
