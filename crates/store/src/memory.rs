//! In-memory store implementation for testing and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    GroupOrder, GroupOrderId, GroupOrderMember, GroupOrderStatus, IndividualOrder, Order, OrderId,
    OrderItem, OrderStatus, Payment, PaymentId, PaymentStatus, Product, ProductId, User, UserId,
};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::{
    NewGroupOrder, NewMember, NewOrder, NewOrderItem, NewPayment, NewProduct, NewUser,
    OrderDetails, Store,
};

#[derive(Debug, Default)]
struct MemState {
    products: HashMap<ProductId, Product>,
    users: HashMap<UserId, User>,
    orders: HashMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    individual_orders: Vec<IndividualOrder>,
    group_orders: HashMap<GroupOrderId, GroupOrder>,
    members: Vec<GroupOrderMember>,
    payments: HashMap<PaymentId, Payment>,
}

impl MemState {
    fn reserve(&mut self, product_id: ProductId, quantity: u32) -> Result<()> {
        let product = self
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })?;
        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(())
    }

    fn release(&mut self, product_id: ProductId, quantity: u32) {
        if let Some(product) = self.products.get_mut(&product_id) {
            product.stock += quantity;
        }
    }

    /// Reserves every line or none: a failure undoes the reservations
    /// already applied, mirroring the Postgres transaction rollback.
    fn reserve_all(&mut self, lines: &[(ProductId, u32)]) -> Result<()> {
        let mut reserved: Vec<(ProductId, u32)> = Vec::with_capacity(lines.len());
        for &(product_id, quantity) in lines {
            match self.reserve(product_id, quantity) {
                Ok(()) => reserved.push((product_id, quantity)),
                Err(e) => {
                    for (pid, qty) in reserved {
                        self.release(pid, qty);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn insert_order_rows(&mut self, order: NewOrder, items: Vec<NewOrderItem>) -> (Order, Vec<OrderItem>) {
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            order_number: order.order_number,
            buyer_id: order.buyer_id,
            status: OrderStatus::Pending,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address,
            notes: order.notes,
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderItem> = items
            .into_iter()
            .map(|item| OrderItem {
                id: uuid::Uuid::new_v4(),
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();
        self.orders.insert(order.id, order.clone());
        self.order_items.extend(items.iter().cloned());
        (order, items)
    }
}

/// In-memory store backed by a single lock.
///
/// Every composite operation runs inside one write-lock critical section,
/// giving it the same all-or-nothing behavior as a Postgres transaction.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = Product {
            id: ProductId::new(),
            name: product.name,
            price: product.price,
            discount_price: product.discount_price,
            stock: product.stock,
            created_at: Utc::now(),
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        state.reserve(id, quantity)
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&id) {
            return Err(StoreError::NotFound {
                entity: "product",
                id: id.to_string(),
            });
        }
        state.release(id, quantity);
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        let user = User {
            id: UserId::new(),
            name: user.name,
            email: user.email,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_individual_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, Vec<OrderItem>, IndividualOrder)> {
        let mut state = self.state.write().await;

        let lines: Vec<(ProductId, u32)> =
            items.iter().map(|i| (i.product_id, i.quantity)).collect();
        state.reserve_all(&lines)?;

        let (order, items) = state.insert_order_rows(order, items);
        let link = IndividualOrder {
            id: uuid::Uuid::new_v4(),
            order_id: order.id,
            buyer_id: order.buyer_id,
        };
        state.individual_orders.push(link.clone());
        Ok((order, items, link))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetails>> {
        let state = self.state.read().await;

        let mut order_ids: Vec<OrderId> = state
            .orders
            .values()
            .filter(|o| o.buyer_id == user_id)
            .map(|o| o.id)
            .collect();
        for member in state.members.iter().filter(|m| m.user_id == user_id) {
            if let Some(group) = state.group_orders.get(&member.group_order_id)
                && !order_ids.contains(&group.order_id)
            {
                order_ids.push(group.order_id);
            }
        }

        let mut details: Vec<OrderDetails> = order_ids
            .into_iter()
            .filter_map(|id| state.orders.get(&id).cloned())
            .map(|order| OrderDetails {
                items: state
                    .order_items
                    .iter()
                    .filter(|i| i.order_id == order.id)
                    .cloned()
                    .collect(),
                payments: state
                    .payments
                    .values()
                    .filter(|p| p.order_id == order.id)
                    .cloned()
                    .collect(),
                group: state
                    .group_orders
                    .values()
                    .find(|g| g.order_id == order.id)
                    .cloned(),
                order,
            })
            .collect();
        details.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        Ok(details)
    }

    async fn create_group_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        group: NewGroupOrder,
    ) -> Result<(Order, GroupOrder, GroupOrderMember)> {
        let mut state = self.state.write().await;

        let (order, _items) = state.insert_order_rows(order, items);
        let group = GroupOrder {
            id: GroupOrderId::new(),
            order_id: order.id,
            creator_id: group.creator_id,
            name: group.name,
            description: group.description,
            deadline: group.deadline,
            status: GroupOrderStatus::Open,
        };
        let creator = GroupOrderMember {
            id: uuid::Uuid::new_v4(),
            group_order_id: group.id,
            user_id: group.creator_id,
            status: common::MemberStatus::Confirmed,
            joined_at: Utc::now(),
        };
        state.group_orders.insert(group.id, group.clone());
        state.members.push(creator.clone());
        Ok((order, group, creator))
    }

    async fn get_group_order(&self, id: GroupOrderId) -> Result<Option<GroupOrder>> {
        let state = self.state.read().await;
        Ok(state.group_orders.get(&id).cloned())
    }

    async fn get_group_members(&self, id: GroupOrderId) -> Result<Vec<GroupOrderMember>> {
        let state = self.state.read().await;
        Ok(state
            .members
            .iter()
            .filter(|m| m.group_order_id == id)
            .cloned()
            .collect())
    }

    async fn insert_member(&self, member: NewMember) -> Result<GroupOrderMember> {
        let mut state = self.state.write().await;
        if !state.group_orders.contains_key(&member.group_order_id) {
            return Err(StoreError::NotFound {
                entity: "group order",
                id: member.group_order_id.to_string(),
            });
        }
        if state
            .members
            .iter()
            .any(|m| m.group_order_id == member.group_order_id && m.user_id == member.user_id)
        {
            return Err(StoreError::DuplicateMember {
                group_order_id: member.group_order_id,
                user_id: member.user_id,
            });
        }
        let member = GroupOrderMember {
            id: uuid::Uuid::new_v4(),
            group_order_id: member.group_order_id,
            user_id: member.user_id,
            status: member.status,
            joined_at: Utc::now(),
        };
        state.members.push(member.clone());
        Ok(member)
    }

    async fn finalize_group_order(&self, id: GroupOrderId) -> Result<GroupOrder> {
        let mut state = self.state.write().await;

        let group = state
            .group_orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "group order",
                id: id.to_string(),
            })?;
        if !group.status.can_finalize() {
            return Err(StoreError::StateConflict {
                entity: "group order",
                id: id.to_string(),
                actual: group.status.to_string(),
                action: "finalize",
            });
        }

        let lines: Vec<(ProductId, u32)> = state
            .order_items
            .iter()
            .filter(|i| i.order_id == group.order_id)
            .map(|i| (i.product_id, i.quantity))
            .collect();
        state.reserve_all(&lines)?;

        if let Some(order) = state.orders.get_mut(&group.order_id)
            && order.status.can_start_processing()
        {
            order.status = OrderStatus::Processing;
            order.updated_at = Utc::now();
        }
        let group = state
            .group_orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                entity: "group order",
                id: id.to_string(),
            })?;
        group.status = GroupOrderStatus::Closed;
        Ok(group.clone())
    }

    async fn cancel_group_order(&self, id: GroupOrderId) -> Result<GroupOrder> {
        let mut state = self.state.write().await;

        let group = state
            .group_orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "group order",
                id: id.to_string(),
            })?;
        if !group.status.can_cancel() {
            return Err(StoreError::StateConflict {
                entity: "group order",
                id: id.to_string(),
                actual: group.status.to_string(),
                action: "cancel",
            });
        }

        if let Some(order) = state.orders.get_mut(&group.order_id)
            && order.status.can_cancel()
        {
            order.status = OrderStatus::Cancelled;
            order.updated_at = Utc::now();
        }
        let group = state
            .group_orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                entity: "group order",
                id: id.to_string(),
            })?;
        group.status = GroupOrderStatus::Cancelled;
        Ok(group.clone())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let mut state = self.state.write().await;
        let payment = Payment {
            id: PaymentId::new(),
            order_id: payment.order_id,
            buyer_id: payment.buyer_id,
            amount: payment.amount,
            method: payment.method,
            gateway_ref: payment.gateway_ref,
            status: PaymentStatus::Pending,
            transaction_id: None,
            created_at: Utc::now(),
        };
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.gateway_ref == gateway_ref)
            .cloned())
    }

    async fn get_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn has_completed_payment(&self, order_id: OrderId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .any(|p| p.order_id == order_id && p.status == PaymentStatus::Completed))
    }

    async fn complete_payment(&self, id: PaymentId, transaction_id: &str) -> Result<Payment> {
        let mut state = self.state.write().await;

        let payment = state.payments.get(&id).cloned().ok_or(StoreError::NotFound {
            entity: "payment",
            id: id.to_string(),
        })?;
        if payment.status.is_terminal() {
            return Ok(payment);
        }

        let order_id = payment.order_id;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                entity: "payment",
                id: id.to_string(),
            })?;
        payment.status = PaymentStatus::Completed;
        payment.transaction_id = Some(transaction_id.to_string());
        let updated = payment.clone();

        if let Some(order) = state.orders.get_mut(&order_id)
            && order.status.can_start_processing()
        {
            order.status = OrderStatus::Processing;
            order.updated_at = Utc::now();
        }
        Ok(updated)
    }

    async fn fail_payment(&self, id: PaymentId, transaction_id: Option<&str>) -> Result<Payment> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                entity: "payment",
                id: id.to_string(),
            })?;
        if payment.status.is_terminal() {
            return Ok(payment.clone());
        }
        payment.status = PaymentStatus::Failed;
        if let Some(txn) = transaction_id {
            payment.transaction_id = Some(txn.to_string());
        }
        Ok(payment.clone())
    }

    async fn refund_payment(&self, id: PaymentId) -> Result<Payment> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                entity: "payment",
                id: id.to_string(),
            })?;
        if payment.status.can_refund() {
            payment.status = PaymentStatus::Refunded;
        }
        Ok(payment.clone())
    }
}
