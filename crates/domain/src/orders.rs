//! Individual order workflow.

use chrono::Utc;
use common::{IndividualOrder, Money, Order, OrderId, OrderItem, ProductId, UserId};
use store::{NewOrder, NewOrderItem, OrderDetails, Store};

use crate::error::DomainError;

/// One requested order line, before pricing.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Client input for an individual order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub items: Vec<OrderLine>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Generates a unique human-facing order number.
pub(crate) fn next_order_number() -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "ORD-{}-{}",
        Utc::now().format("%Y%m%d"),
        token[..8].to_uppercase()
    )
}

/// Validates and prices requested lines against the catalog.
///
/// Snapshots each line's unit price (discount-aware) and accumulates the
/// order total. The stock pre-check is advisory for friendly errors; the
/// store's conditional decrement is what actually prevents overselling.
pub(crate) async fn price_lines<S: Store>(
    store: &S,
    lines: &[OrderLine],
    check_stock: bool,
) -> Result<(Vec<NewOrderItem>, Money), DomainError> {
    if lines.is_empty() {
        return Err(DomainError::EmptyOrder);
    }

    let mut items = Vec::with_capacity(lines.len());
    let mut total = Money::zero();
    for line in lines {
        if line.quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: line.quantity,
            });
        }
        let product = store
            .get_product(line.product_id)
            .await?
            .ok_or(DomainError::ProductNotFound(line.product_id))?;
        if check_stock && product.stock < line.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: line.product_id,
                requested: line.quantity,
                available: product.stock,
            });
        }
        let unit_price = product.unit_price();
        total += unit_price.multiply(line.quantity);
        items.push(NewOrderItem {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price,
        });
    }
    Ok((items, total))
}

/// Service for individual orders.
pub struct OrderService<S> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates an individual order.
    ///
    /// Validates and prices every line, then persists the order, its
    /// items, and its individual-order link while reserving stock, all in
    /// one atomic store operation. Any failure leaves nothing behind.
    #[tracing::instrument(skip(self, draft), fields(lines = draft.items.len()))]
    pub async fn create_order(
        &self,
        buyer_id: UserId,
        draft: OrderDraft,
    ) -> Result<(Order, Vec<OrderItem>, IndividualOrder), DomainError> {
        let (items, total_amount) = price_lines(&self.store, &draft.items, true).await?;

        let new_order = NewOrder {
            order_number: next_order_number(),
            buyer_id,
            total_amount,
            shipping_address: draft.shipping_address,
            notes: draft.notes,
        };
        let (order, items, link) = self.store.create_individual_order(new_order, items).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, order_number = %order.order_number, "individual order created");
        Ok((order, items, link))
    }

    /// Loads an order by id.
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.store.get_order(id).await?)
    }

    /// Lists the orders a user placed or participates in, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetails>, DomainError> {
        Ok(self.store.orders_for_user(user_id).await?)
    }
}
