//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    GroupOrder, GroupOrderId, GroupOrderMember, GroupOrderStatus, IndividualOrder, MemberStatus,
    Money, Order, OrderId, OrderItem, OrderStatus, Payment, PaymentId, PaymentStatus, Product,
    ProductId, User, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::{
    NewGroupOrder, NewMember, NewOrder, NewOrderItem, NewPayment, NewProduct, NewUser,
    OrderDetails, Store,
};

const ORDER_COLUMNS: &str = "id, order_number, buyer_id, status, total_amount, \
     shipping_address, notes, created_at, updated_at";
const PAYMENT_COLUMNS: &str =
    "id, order_id, buyer_id, amount, method, gateway_ref, status, transaction_id, created_at";

/// PostgreSQL store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Conditional atomic stock decrement.
    ///
    /// The check and decrement are one statement, so concurrent
    /// reservations serialize on the row and can never drive stock
    /// negative. Zero affected rows is disambiguated into NotFound vs
    /// InsufficientStock with a follow-up read.
    async fn reserve_with(
        conn: &mut PgConnection,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        let res = sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
            .bind(product_id.as_uuid())
            .bind(quantity as i32)
            .execute(&mut *conn)
            .await?;

        if res.rows_affected() == 0 {
            let available: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;
            return Err(match available {
                None => StoreError::NotFound {
                    entity: "product",
                    id: product_id.to_string(),
                },
                Some(available) => StoreError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: available as u32,
                },
            });
        }
        Ok(())
    }

    async fn insert_order_rows(
        conn: &mut PgConnection,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, Vec<OrderItem>)> {
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

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, buyer_id, status, total_amount,
                                shipping_address, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.buyer_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_amount.paise())
        .bind(&order.shipping_address)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let item = OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            };
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.quantity as i32)
            .bind(item.unit_price.paise())
            .execute(&mut *conn)
            .await?;
            inserted.push(item);
        }

        Ok((order, inserted))
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_paise(row.try_get("price")?),
            discount_price: row
                .try_get::<Option<i64>, _>("discount_price")?
                .map(Money::from_paise),
            stock: row.try_get::<i32, _>("stock")? as u32,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_number: row.try_get("order_number")?,
            buyer_id: UserId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            status: OrderStatus::parse(&status).ok_or(StoreError::UnknownStatus {
                field: "orders.status",
                value: status,
            })?,
            total_amount: Money::from_paise(row.try_get("total_amount")?),
            shipping_address: row.try_get("shipping_address")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: row.try_get("id")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price: Money::from_paise(row.try_get("unit_price")?),
        })
    }

    fn row_to_group(row: PgRow) -> Result<GroupOrder> {
        let status: String = row.try_get("status")?;
        Ok(GroupOrder {
            id: GroupOrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            creator_id: UserId::from_uuid(row.try_get::<Uuid, _>("creator_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            deadline: row.try_get::<DateTime<Utc>, _>("deadline")?,
            status: GroupOrderStatus::parse(&status).ok_or(StoreError::UnknownStatus {
                field: "group_orders.status",
                value: status,
            })?,
        })
    }

    fn row_to_member(row: PgRow) -> Result<GroupOrderMember> {
        let status: String = row.try_get("status")?;
        Ok(GroupOrderMember {
            id: row.try_get("id")?,
            group_order_id: GroupOrderId::from_uuid(row.try_get::<Uuid, _>("group_order_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            status: MemberStatus::parse(&status).ok_or(StoreError::UnknownStatus {
                field: "group_order_members.status",
                value: status,
            })?,
            joined_at: row.try_get("joined_at")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let status: String = row.try_get("status")?;
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            buyer_id: UserId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            amount: Money::from_paise(row.try_get("amount")?),
            method: row.try_get("method")?,
            gateway_ref: row.try_get("gateway_ref")?,
            status: PaymentStatus::parse(&status).ok_or(StoreError::UnknownStatus {
                field: "payments.status",
                value: status,
            })?,
            transaction_id: row.try_get("transaction_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let created = Product {
            id: ProductId::new(),
            name: product.name,
            price: product.price,
            discount_price: product.discount_price,
            stock: product.stock,
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, discount_price, stock, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(created.id.as_uuid())
        .bind(&created.name)
        .bind(created.price.paise())
        .bind(created.discount_price.map(|p| p.paise()))
        .bind(created.stock as i32)
        .bind(created.created_at)
        .execute(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, price, discount_price, stock, created_at FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::reserve_with(&mut conn, id, quantity).await
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<()> {
        let res = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(quantity as i32)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "product",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let created = User {
            id: UserId::new(),
            name: user.name,
            email: user.email,
            created_at: Utc::now(),
        };
        sqlx::query("INSERT INTO users (id, name, email, created_at) VALUES ($1, $2, $3, $4)")
            .bind(created.id.as_uuid())
            .bind(&created.name)
            .bind(&created.email)
            .bind(created.created_at)
            .execute(&self.pool)
            .await?;
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, created_at FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn create_individual_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, Vec<OrderItem>, IndividualOrder)> {
        let mut tx = self.pool.begin().await?;

        let (order, items) = Self::insert_order_rows(&mut tx, order, items).await?;
        for item in &items {
            Self::reserve_with(&mut tx, item.product_id, item.quantity).await?;
        }

        let link = IndividualOrder {
            id: Uuid::new_v4(),
            order_id: order.id,
            buyer_id: order.buyer_id,
        };
        sqlx::query("INSERT INTO individual_orders (id, order_id, buyer_id) VALUES ($1, $2, $3)")
            .bind(link.id)
            .bind(link.order_id.as_uuid())
            .bind(link.buyer_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((order, items, link))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT id, order_id, product_id, quantity, unit_price FROM order_items WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetails>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1
            UNION
            SELECT o.id, o.order_number, o.buyer_id, o.status, o.total_amount,
                   o.shipping_address, o.notes, o.created_at, o.updated_at
            FROM orders o
            JOIN group_orders g ON g.order_id = o.id
            JOIN group_order_members m ON m.group_order_id = g.id
            WHERE m.user_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            let order = Self::row_to_order(row)?;
            let items = self.get_order_items(order.id).await?;
            let payment_rows = sqlx::query(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at"
            ))
            .bind(order.id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
            let payments = payment_rows
                .into_iter()
                .map(Self::row_to_payment)
                .collect::<Result<Vec<_>>>()?;
            let group_row = sqlx::query(
                "SELECT id, order_id, creator_id, name, description, deadline, status \
                 FROM group_orders WHERE order_id = $1",
            )
            .bind(order.id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
            let group = group_row.map(Self::row_to_group).transpose()?;

            details.push(OrderDetails {
                order,
                items,
                payments,
                group,
            });
        }
        Ok(details)
    }

    async fn create_group_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        group: NewGroupOrder,
    ) -> Result<(Order, GroupOrder, GroupOrderMember)> {
        let mut tx = self.pool.begin().await?;

        let (order, _items) = Self::insert_order_rows(&mut tx, order, items).await?;

        let group = GroupOrder {
            id: GroupOrderId::new(),
            order_id: order.id,
            creator_id: group.creator_id,
            name: group.name,
            description: group.description,
            deadline: group.deadline,
            status: GroupOrderStatus::Open,
        };
        sqlx::query(
            r#"
            INSERT INTO group_orders (id, order_id, creator_id, name, description, deadline, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(group.id.as_uuid())
        .bind(group.order_id.as_uuid())
        .bind(group.creator_id.as_uuid())
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.deadline)
        .bind(group.status.as_str())
        .execute(&mut *tx)
        .await?;

        let creator = GroupOrderMember {
            id: Uuid::new_v4(),
            group_order_id: group.id,
            user_id: group.creator_id,
            status: MemberStatus::Confirmed,
            joined_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO group_order_members (id, group_order_id, user_id, status, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(creator.id)
        .bind(creator.group_order_id.as_uuid())
        .bind(creator.user_id.as_uuid())
        .bind(creator.status.as_str())
        .bind(creator.joined_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((order, group, creator))
    }

    async fn get_group_order(&self, id: GroupOrderId) -> Result<Option<GroupOrder>> {
        let row = sqlx::query(
            "SELECT id, order_id, creator_id, name, description, deadline, status \
             FROM group_orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_group).transpose()
    }

    async fn get_group_members(&self, id: GroupOrderId) -> Result<Vec<GroupOrderMember>> {
        let rows = sqlx::query(
            "SELECT id, group_order_id, user_id, status, joined_at \
             FROM group_order_members WHERE group_order_id = $1 ORDER BY joined_at",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_member).collect()
    }

    async fn insert_member(&self, member: NewMember) -> Result<GroupOrderMember> {
        let created = GroupOrderMember {
            id: Uuid::new_v4(),
            group_order_id: member.group_order_id,
            user_id: member.user_id,
            status: member.status,
            joined_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO group_order_members (id, group_order_id, user_id, status, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(created.id)
        .bind(created.group_order_id.as_uuid())
        .bind(created.user_id.as_uuid())
        .bind(created.status.as_str())
        .bind(created.joined_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Unique constraint violation means a concurrent join won
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_group_member")
            {
                return StoreError::DuplicateMember {
                    group_order_id: member.group_order_id,
                    user_id: member.user_id,
                };
            }
            StoreError::Database(e)
        })?;
        Ok(created)
    }

    async fn finalize_group_order(&self, id: GroupOrderId) -> Result<GroupOrder> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "UPDATE group_orders SET status = 'CLOSED' \
             WHERE id = $1 AND status = 'OPEN' RETURNING order_id",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM group_orders WHERE id = $1")
                    .bind(id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match actual {
                None => StoreError::NotFound {
                    entity: "group order",
                    id: id.to_string(),
                },
                Some(actual) => StoreError::StateConflict {
                    entity: "group order",
                    id: id.to_string(),
                    actual,
                    action: "finalize",
                },
            });
        };
        let order_id: Uuid = row.try_get("order_id")?;

        sqlx::query(
            "UPDATE orders SET status = 'PROCESSING', updated_at = $2 \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(order_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        // Inventory commits here, not at creation
        let item_rows =
            sqlx::query("SELECT product_id, quantity FROM order_items WHERE order_id = $1")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;
        for item_row in item_rows {
            let product_id = ProductId::from_uuid(item_row.try_get::<Uuid, _>("product_id")?);
            let quantity = item_row.try_get::<i32, _>("quantity")? as u32;
            Self::reserve_with(&mut tx, product_id, quantity).await?;
        }

        tx.commit().await?;

        self.get_group_order(id).await?.ok_or(StoreError::NotFound {
            entity: "group order",
            id: id.to_string(),
        })
    }

    async fn cancel_group_order(&self, id: GroupOrderId) -> Result<GroupOrder> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "UPDATE group_orders SET status = 'CANCELLED' \
             WHERE id = $1 AND status = 'OPEN' RETURNING order_id",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM group_orders WHERE id = $1")
                    .bind(id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match actual {
                None => StoreError::NotFound {
                    entity: "group order",
                    id: id.to_string(),
                },
                Some(actual) => StoreError::StateConflict {
                    entity: "group order",
                    id: id.to_string(),
                    actual,
                    action: "cancel",
                },
            });
        };
        let order_id: Uuid = row.try_get("order_id")?;

        sqlx::query(
            "UPDATE orders SET status = 'CANCELLED', updated_at = $2 \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(order_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_group_order(id).await?.ok_or(StoreError::NotFound {
            entity: "group order",
            id: id.to_string(),
        })
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let created = Payment {
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
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, buyer_id, amount, method, gateway_ref,
                                  status, transaction_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(created.id.as_uuid())
        .bind(created.order_id.as_uuid())
        .bind(created.buyer_id.as_uuid())
        .bind(created.amount.paise())
        .bind(&created.method)
        .bind(&created.gateway_ref)
        .bind(created.status.as_str())
        .bind(&created.transaction_id)
        .bind(created.created_at)
        .execute(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_ref = $1"
        ))
        .bind(gateway_ref)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn get_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn has_completed_payment(&self, order_id: OrderId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM payments WHERE order_id = $1 AND status = 'COMPLETED')",
        )
        .bind(order_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn complete_payment(&self, id: PaymentId, transaction_id: &str) -> Result<Payment> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let payment = Self::row_to_payment(row.ok_or(StoreError::NotFound {
            entity: "payment",
            id: id.to_string(),
        })?)?;

        // Terminal payments are skipped: a replayed event keeps the
        // original transaction reference and triggers nothing downstream.
        if payment.status.is_terminal() {
            tx.commit().await?;
            return Ok(payment);
        }

        sqlx::query("UPDATE payments SET status = 'COMPLETED', transaction_id = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(transaction_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE orders SET status = 'PROCESSING', updated_at = $2 \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(payment.order_id.as_uuid())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Payment {
            status: PaymentStatus::Completed,
            transaction_id: Some(transaction_id.to_string()),
            ..payment
        })
    }

    async fn fail_payment(&self, id: PaymentId, transaction_id: Option<&str>) -> Result<Payment> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let payment = Self::row_to_payment(row.ok_or(StoreError::NotFound {
            entity: "payment",
            id: id.to_string(),
        })?)?;

        if payment.status.is_terminal() {
            tx.commit().await?;
            return Ok(payment);
        }

        sqlx::query(
            "UPDATE payments SET status = 'FAILED', \
             transaction_id = COALESCE($2, transaction_id) WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Payment {
            status: PaymentStatus::Failed,
            transaction_id: transaction_id
                .map(str::to_string)
                .or(payment.transaction_id.clone()),
            ..payment
        })
    }

    async fn refund_payment(&self, id: PaymentId) -> Result<Payment> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let payment = Self::row_to_payment(row.ok_or(StoreError::NotFound {
            entity: "payment",
            id: id.to_string(),
        })?)?;

        if !payment.status.can_refund() {
            tx.commit().await?;
            return Ok(payment);
        }

        sqlx::query("UPDATE payments SET status = 'REFUNDED' WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Payment {
            status: PaymentStatus::Refunded,
            ..payment
        })
    }
}
