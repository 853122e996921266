//! Shared types for the merch order system.
//!
//! Identifier newtypes, money, and the persistent data model with its
//! status state machines. Everything here is plain data — behavior
//! lives in the `domain` and `payments` crates.

mod catalog;
mod group;
mod money;
mod order;
mod payment;
mod types;

pub use catalog::{Product, User};
pub use group::{GroupOrder, GroupOrderMember, GroupOrderStatus, MemberStatus};
pub use money::Money;
pub use order::{IndividualOrder, Order, OrderItem, OrderStatus};
pub use payment::{Payment, PaymentStatus};
pub use types::{GroupOrderId, OrderId, PaymentId, ProductId, UserId};
