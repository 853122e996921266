//! The `Store` trait: the persistence contract shared by both backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    GroupOrder, GroupOrderId, GroupOrderMember, IndividualOrder, MemberStatus, Money, Order,
    OrderId, OrderItem, Payment, PaymentId, Product, ProductId, User, UserId,
};

use crate::error::Result;

/// Input for inserting a catalog product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub stock: u32,
}

/// Input for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Input for an order header. Orders are always created Pending.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub buyer_id: UserId,
    pub total_amount: Money,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Input for one order line with its price snapshot already taken.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Input for a group order shell. Group orders are always created Open.
#[derive(Debug, Clone)]
pub struct NewGroupOrder {
    pub creator_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
}

/// Input for a group order membership row.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub group_order_id: GroupOrderId,
    pub user_id: UserId,
    pub status: MemberStatus,
}

/// Input for a payment intent row. Payments are always created Pending.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub amount: Money,
    pub method: String,
    pub gateway_ref: String,
}

/// An order with its lines, payments, and group context, as returned by
/// the user order listing.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub group: Option<GroupOrder>,
}

/// Persistence contract for the order/payment core.
///
/// Composite operations (`create_individual_order`, `create_group_order`,
/// `finalize_group_order`, `cancel_group_order`, `complete_payment`) are
/// atomic: either every write within them commits or none do. Status
/// changes inside them are conditional on the expected current state, so
/// concurrent writers lose cleanly instead of double-applying.
#[async_trait]
pub trait Store: Send + Sync {
    // -- catalog --

    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Atomically reserves `quantity` units of a product.
    ///
    /// The stock check and decrement are a single conditional operation;
    /// two racing reservations can never drive stock negative. Fails with
    /// `NotFound` for an unknown product and `InsufficientStock` when
    /// fewer units are available than requested.
    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<()>;

    /// Atomically returns `quantity` units of a product to stock.
    ///
    /// The inverse of `reserve_stock`. No workflow calls this on
    /// cancellation; it exists for manual stock adjustment.
    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<()>;

    // -- users --

    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // -- orders --

    /// Persists an order, its items, and its individual-order link, and
    /// reserves stock for every line, all in one transaction.
    ///
    /// A failed reservation aborts the whole operation: no order rows
    /// exist afterwards and no stock has moved.
    async fn create_individual_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, Vec<OrderItem>, IndividualOrder)>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Returns the orders a user placed or participates in (via group
    /// order membership), newest first, with items, payments, and group
    /// context attached.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetails>>;

    // -- group orders --

    /// Persists an order, its items, the Open group order shell, and the
    /// creator's Confirmed membership in one transaction. No stock is
    /// checked or reserved; reservation happens at finalize.
    async fn create_group_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        group: NewGroupOrder,
    ) -> Result<(Order, GroupOrder, GroupOrderMember)>;

    async fn get_group_order(&self, id: GroupOrderId) -> Result<Option<GroupOrder>>;

    async fn get_group_members(&self, id: GroupOrderId) -> Result<Vec<GroupOrderMember>>;

    /// Inserts a membership row.
    ///
    /// Fails with `DuplicateMember` if the (group order, user) pair
    /// already exists; backed by a unique constraint so the invariant
    /// survives racing joins regardless of isolation level.
    async fn insert_member(&self, member: NewMember) -> Result<GroupOrderMember>;

    /// Closes an Open group order: status to Closed, its order to
    /// Processing, and stock reserved for every order item, all in one
    /// transaction.
    ///
    /// The Open -> Closed update is conditional; a racing finalize or
    /// cancel gets `StateConflict`. Any failed reservation rolls the
    /// whole transaction back, leaving the group order Open.
    async fn finalize_group_order(&self, id: GroupOrderId) -> Result<GroupOrder>;

    /// Cancels an Open group order: status to Cancelled and its order to
    /// Cancelled. No inventory changes; nothing was reserved before
    /// finalize.
    async fn cancel_group_order(&self, id: GroupOrderId) -> Result<GroupOrder>;

    // -- payments --

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment>;

    /// Looks up a payment by the gateway's order reference.
    async fn get_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>>;

    /// Looks up a payment by its recorded gateway payment reference.
    async fn get_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>>;

    /// Returns true if the order already has a Completed payment.
    async fn has_completed_payment(&self, order_id: OrderId) -> Result<bool>;

    /// Marks a Pending payment Completed, records the gateway payment
    /// reference, and moves the order Pending -> Processing, in one
    /// transaction.
    ///
    /// A payment already in a terminal state is returned unchanged (a
    /// replayed gateway event must not clobber `transaction_id`), and the
    /// order update is conditional, so a Cancelled order stays Cancelled.
    async fn complete_payment(&self, id: PaymentId, transaction_id: &str) -> Result<Payment>;

    /// Marks a Pending payment Failed, recording the gateway payment
    /// reference when one is known. Terminal payments are returned
    /// unchanged. The order is not touched.
    async fn fail_payment(&self, id: PaymentId, transaction_id: Option<&str>) -> Result<Payment>;

    /// Marks a Completed payment Refunded. Payments in any other state
    /// are returned unchanged.
    async fn refund_payment(&self, id: PaymentId) -> Result<Payment>;
}
