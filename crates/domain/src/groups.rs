//! Group order workflow.
//!
//! A group order is a shared cart: one creator opens it, others join or
//! are invited while it is Open, and a single finalize event closes
//! membership and commits inventory. Stock is deliberately not touched
//! at creation time; final participation is unknown until finalize.

use chrono::{DateTime, Utc};
use common::{GroupOrder, GroupOrderId, GroupOrderMember, MemberStatus, Order, UserId};
use store::{NewGroupOrder, NewMember, NewOrder, Store};

use crate::error::DomainError;
use crate::orders::{OrderLine, next_order_number, price_lines};

/// Client input for a group order.
#[derive(Debug, Clone)]
pub struct GroupDraft {
    pub name: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub items: Vec<OrderLine>,
}

/// Service for the group order lifecycle.
pub struct GroupOrderService<S> {
    store: S,
}

impl<S: Store> GroupOrderService<S> {
    /// Creates a new group order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Opens a new group order.
    ///
    /// Prices the items (discount-aware snapshot) but neither checks nor
    /// reserves stock; reservation is deferred to finalize. The creator
    /// becomes the first Confirmed member.
    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(
        &self,
        creator_id: UserId,
        draft: GroupDraft,
    ) -> Result<(Order, GroupOrder), DomainError> {
        if draft.deadline <= Utc::now() {
            return Err(DomainError::DeadlinePassed {
                deadline: draft.deadline,
            });
        }
        let (items, total_amount) = price_lines(&self.store, &draft.items, false).await?;

        let order = NewOrder {
            order_number: next_order_number(),
            buyer_id: creator_id,
            total_amount,
            shipping_address: None,
            notes: None,
        };
        let group = NewGroupOrder {
            creator_id,
            name: draft.name,
            description: draft.description,
            deadline: draft.deadline,
        };
        let (order, group, _creator) = self.store.create_group_order(order, items, group).await?;

        metrics::counter!("group_orders_created_total").increment(1);
        tracing::info!(group_order_id = %group.id, order_id = %order.id, "group order opened");
        Ok((order, group))
    }

    /// Joins an Open group order as a Confirmed member.
    #[tracing::instrument(skip(self))]
    pub async fn join(
        &self,
        group_order_id: GroupOrderId,
        user_id: UserId,
    ) -> Result<GroupOrderMember, DomainError> {
        let group = self.load(group_order_id).await?;
        if !group.status.accepts_members() {
            return Err(DomainError::InvalidState {
                entity: "group order",
                current: group.status.to_string(),
                action: "join",
            });
        }

        // the unique constraint backstops this insert under racing joins
        let member = self
            .store
            .insert_member(NewMember {
                group_order_id,
                user_id,
                status: MemberStatus::Confirmed,
            })
            .await?;
        Ok(member)
    }

    /// Invites a user (by email) to an Open group order. Creator only.
    #[tracing::instrument(skip(self, email))]
    pub async fn invite(
        &self,
        group_order_id: GroupOrderId,
        inviter_id: UserId,
        email: &str,
    ) -> Result<GroupOrderMember, DomainError> {
        let group = self.load(group_order_id).await?;
        if group.creator_id != inviter_id {
            return Err(DomainError::Forbidden {
                action: "invite to this group order",
            });
        }
        if !group.status.accepts_members() {
            return Err(DomainError::InvalidState {
                entity: "group order",
                current: group.status.to_string(),
                action: "invite",
            });
        }

        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| DomainError::UserNotFound {
                email: email.to_string(),
            })?;

        let member = self
            .store
            .insert_member(NewMember {
                group_order_id,
                user_id: user.id,
                status: MemberStatus::Invited,
            })
            .await?;
        Ok(member)
    }

    /// Finalizes an Open group order. Creator only.
    ///
    /// Closes membership, moves the order to Processing, and commits
    /// inventory for every line, all in one store transaction. If any
    /// reservation fails the group order remains Open.
    #[tracing::instrument(skip(self))]
    pub async fn finalize(
        &self,
        group_order_id: GroupOrderId,
        caller_id: UserId,
    ) -> Result<GroupOrder, DomainError> {
        let group = self.load(group_order_id).await?;
        if group.creator_id != caller_id {
            return Err(DomainError::Forbidden {
                action: "finalize this group order",
            });
        }
        if !group.status.can_finalize() {
            return Err(DomainError::InvalidState {
                entity: "group order",
                current: group.status.to_string(),
                action: "finalize",
            });
        }

        let group = self.store.finalize_group_order(group_order_id).await?;
        metrics::counter!("group_orders_finalized_total").increment(1);
        tracing::info!(group_order_id = %group.id, "group order finalized");
        Ok(group)
    }

    /// Cancels an Open group order. Creator only. No inventory moves;
    /// nothing was reserved before finalize.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        group_order_id: GroupOrderId,
        caller_id: UserId,
    ) -> Result<GroupOrder, DomainError> {
        let group = self.load(group_order_id).await?;
        if group.creator_id != caller_id {
            return Err(DomainError::Forbidden {
                action: "cancel this group order",
            });
        }
        if !group.status.can_cancel() {
            return Err(DomainError::InvalidState {
                entity: "group order",
                current: group.status.to_string(),
                action: "cancel",
            });
        }

        let group = self.store.cancel_group_order(group_order_id).await?;
        tracing::info!(group_order_id = %group.id, "group order cancelled");
        Ok(group)
    }

    /// Loads a group order by id.
    pub async fn get(&self, id: GroupOrderId) -> Result<Option<GroupOrder>, DomainError> {
        Ok(self.store.get_group_order(id).await?)
    }

    /// Lists the members of a group order.
    pub async fn members(&self, id: GroupOrderId) -> Result<Vec<GroupOrderMember>, DomainError> {
        Ok(self.store.get_group_members(id).await?)
    }

    async fn load(&self, id: GroupOrderId) -> Result<GroupOrder, DomainError> {
        self.store
            .get_group_order(id)
            .await?
            .ok_or(DomainError::GroupOrderNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{GroupOrderStatus, Money, OrderStatus};
    use store::{InMemoryStore, NewProduct, NewUser};

    async fn seed_product(store: &InMemoryStore, price: i64, stock: u32) -> common::Product {
        store
            .insert_product(NewProduct {
                name: "Tee".to_string(),
                price: Money::from_paise(price),
                discount_price: None,
                stock,
            })
            .await
            .unwrap()
    }

    fn draft(items: Vec<OrderLine>) -> GroupDraft {
        GroupDraft {
            name: "Batch of 2026 merch".to_string(),
            description: Some("Farewell tees".to_string()),
            deadline: Utc::now() + chrono::Duration::days(7),
            items,
        }
    }

    #[tokio::test]
    async fn create_prices_without_touching_stock() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let p1 = seed_product(&store, 10000, 5).await;
        let p2 = seed_product(&store, 5000, 5).await;

        let (order, group) = service
            .create(
                UserId::new(),
                draft(vec![
                    OrderLine {
                        product_id: p1.id,
                        quantity: 2,
                    },
                    OrderLine {
                        product_id: p2.id,
                        quantity: 1,
                    },
                ]),
            )
            .await
            .unwrap();

        assert_eq!(order.total_amount.paise(), 25000);
        assert_eq!(group.status, GroupOrderStatus::Open);
        // no reservation at creation
        assert_eq!(store.get_product(p1.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.get_product(p2.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn create_allows_items_beyond_current_stock() {
        // participation is unknown until finalize, so creation does not
        // stock-check
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 1).await;

        let (_, group) = service
            .create(
                UserId::new(),
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 50,
                }]),
            )
            .await
            .unwrap();
        assert_eq!(group.status, GroupOrderStatus::Open);
    }

    #[tokio::test]
    async fn create_rejects_past_deadline() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;

        let err = service
            .create(
                UserId::new(),
                GroupDraft {
                    deadline: Utc::now() - chrono::Duration::hours(1),
                    ..draft(vec![OrderLine {
                        product_id: product.id,
                        quantity: 1,
                    }])
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DeadlinePassed { .. }));
    }

    #[tokio::test]
    async fn creator_is_first_confirmed_member() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;
        let creator = UserId::new();

        let (_, group) = service
            .create(
                creator,
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();

        let members = service.members(group.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, creator);
        assert_eq!(members[0].status, MemberStatus::Confirmed);
    }

    #[tokio::test]
    async fn join_inserts_confirmed_member_once() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;
        let (_, group) = service
            .create(
                UserId::new(),
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();

        let user = UserId::new();
        let member = service.join(group.id, user).await.unwrap();
        assert_eq!(member.status, MemberStatus::Confirmed);

        let err = service.join(group.id, user).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyMember { .. }));
    }

    #[tokio::test]
    async fn join_missing_group_is_not_found() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store);

        let err = service
            .join(GroupOrderId::new(), UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::GroupOrderNotFound(_)));
    }

    #[tokio::test]
    async fn join_closed_group_is_invalid_state() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;
        let creator = UserId::new();
        let (_, group) = service
            .create(
                creator,
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();
        service.finalize(group.id, creator).await.unwrap();

        let err = service.join(group.id, UserId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn invite_by_non_creator_is_forbidden() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;
        store
            .insert_user(NewUser {
                name: "Priya".to_string(),
                email: "priya@example.com".to_string(),
            })
            .await
            .unwrap();
        let (_, group) = service
            .create(
                UserId::new(),
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();

        let err = service
            .invite(group.id, UserId::new(), "priya@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));
        // no membership row was created
        assert_eq!(service.members(group.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invite_resolves_email_to_invited_member() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;
        let invitee = store
            .insert_user(NewUser {
                name: "Priya".to_string(),
                email: "priya@example.com".to_string(),
            })
            .await
            .unwrap();
        let creator = UserId::new();
        let (_, group) = service
            .create(
                creator,
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();

        let member = service
            .invite(group.id, creator, "priya@example.com")
            .await
            .unwrap();
        assert_eq!(member.user_id, invitee.id);
        assert_eq!(member.status, MemberStatus::Invited);

        let err = service
            .invite(group.id, creator, "nobody@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn finalize_by_non_creator_is_forbidden() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;
        let (_, group) = service
            .create(
                UserId::new(),
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();

        let err = service.finalize(group.id, UserId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden { .. }));
        assert_eq!(
            service.get(group.id).await.unwrap().unwrap().status,
            GroupOrderStatus::Open
        );
    }

    #[tokio::test]
    async fn finalize_commits_inventory_and_processes_order() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;
        let creator = UserId::new();
        let (order, group) = service
            .create(
                creator,
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 2,
                }]),
            )
            .await
            .unwrap();

        let finalized = service.finalize(group.id, creator).await.unwrap();
        assert_eq!(finalized.status, GroupOrderStatus::Closed);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 3);
        assert_eq!(
            store.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Processing
        );
    }

    #[tokio::test]
    async fn finalize_on_insufficient_stock_leaves_group_open() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 1).await;
        let creator = UserId::new();
        let (order, group) = service
            .create(
                creator,
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 3,
                }]),
            )
            .await
            .unwrap();

        let err = service.finalize(group.id, creator).await.unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(
            service.get(group.id).await.unwrap().unwrap().status,
            GroupOrderStatus::Open
        );
        assert_eq!(
            store.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn cancel_is_terminal_and_releases_nothing() {
        let store = InMemoryStore::new();
        let service = GroupOrderService::new(store.clone());
        let product = seed_product(&store, 10000, 5).await;
        let creator = UserId::new();
        let (order, group) = service
            .create(
                creator,
                draft(vec![OrderLine {
                    product_id: product.id,
                    quantity: 2,
                }]),
            )
            .await
            .unwrap();

        let cancelled = service.cancel(group.id, creator).await.unwrap();
        assert_eq!(cancelled.status, GroupOrderStatus::Cancelled);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(
            store.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Cancelled
        );

        // terminal: neither finalize nor a second cancel applies
        let err = service.finalize(group.id, creator).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
        let err = service.cancel(group.id, creator).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }
}
