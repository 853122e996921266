//! Persistence layer for the order/payment core.
//!
//! The [`Store`] trait is the only write path to shared state: product
//! stock moves exclusively through its reservation operations, and every
//! multi-entity workflow write is a single composite operation that either
//! fully commits or leaves nothing behind.
//!
//! Two implementations share the trait: [`PostgresStore`] for deployment
//! and [`InMemoryStore`] for tests and local development.

mod error;
mod memory;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{
    NewGroupOrder, NewMember, NewOrder, NewOrderItem, NewPayment, NewProduct, NewUser,
    OrderDetails, Store,
};
