//! Orders and checkout.

use sqlx::PgPool;

use shop_core::{OrderId, OrderStatus, Price, UserId};

use super::RepositoryError;
use super::items::lock_cart;
use super::query::{Field, FieldKind};
use super::resource::{Resource, ResourceRepository, Scope, SqlValue};
use crate::models::Order;

const STATUS_LABELS: &[&str] = &["new", "processing", "shipping", "delivered", "canceled"];

pub struct Orders;

impl Resource for Orders {
    type Id = OrderId;
    type Record = Order;

    const TABLE: &'static str = "orders";
    const SINGULAR: &'static str = "order";
    const PLURAL: &'static str = "orders";
    const SELECT: &'static str = r"SELECT o.id, o.user_id, u.name AS user_name, u.email AS user_email,
            o.address, o.phone, o.status, o.total, o.created_at,
            COALESCE((
                SELECT json_agg(json_build_object(
                    'id', i.id,
                    'product', json_build_object(
                        'id', i.product_id, 'name', i.product_name, 'price', i.unit_price, 'image', p.image
                    ),
                    'quantity', i.quantity,
                    'option', i.option
                ) ORDER BY i.id)
                FROM items i LEFT JOIN products p ON p.id = i.product_id
                WHERE i.order_id = o.id
            ), '[]'::json) AS items
        FROM orders o JOIN users u ON u.id = o.user_id";
    const ID_COLUMN: &'static str = "o.id";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "o.id", FieldKind::Integer),
        Field::new("user", "o.user_id", FieldKind::Integer),
        Field::new("address", "o.address", FieldKind::Text),
        Field::new("phone", "o.phone", FieldKind::Text),
        Field::new(
            "status",
            "o.status",
            FieldKind::Enum {
                type_name: "order_status",
                variants: STATUS_LABELS,
            },
        ),
        Field::new("total", "o.total", FieldKind::Decimal),
        Field::new("createdAt", "o.created_at", FieldKind::Timestamp),
    ];
}

/// Restrict order queries to orders placed by `user`.
#[must_use]
pub fn owner_scope(user: UserId) -> Scope {
    Scope::Eq("o.user_id", SqlValue::Int(user.as_i32()))
}

/// Sum of `(id, price, quantity)` lines, `None` past [`Price::MAX`].
fn order_total(lines: &[(i32, Price, i32)]) -> Option<Price> {
    lines.iter().try_fold(Price::ZERO, |total, (_, price, quantity)| {
        total.checked_add(price.line_total(*quantity)?)
    })
}

/// Outcome of an order deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDeletion {
    Deleted,
    NotFound,
    /// The owner tried to delete an order that is already being handled.
    NotNew(OrderStatus),
}

/// Repository for order writes.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: i32) -> Result<Order, RepositoryError> {
        ResourceRepository::<Orders>::new(self.pool)
            .get(OrderId::new(id), &[])
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("order {id} vanished after write")))
    }

    /// Turn `user`'s cart into an order.
    ///
    /// Holds the cart lock, totals the locked lines at current prices,
    /// inserts the order and moves exactly those lines onto it with a name
    /// and price snapshot, all in one transaction. Returns `None` when the
    /// cart is empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid("total")` when the total exceeds
    /// [`Price::MAX`] and `RepositoryError::Database` if any statement fails;
    /// nothing is written in either case.
    pub async fn checkout(
        &self,
        user: UserId,
        address: &str,
        phone: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_cart(&mut *tx, user).await?;

        let lines = sqlx::query_as::<_, (i32, Price, i32)>(
            r"
            SELECT i.id, p.price, i.quantity
            FROM items i JOIN products p ON p.id = i.product_id
            WHERE i.user_id = $1 AND i.order_id IS NULL
            ORDER BY i.id
            FOR UPDATE OF i FOR SHARE OF p
            ",
        )
        .bind(user)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Ok(None);
        }

        let total = order_total(&lines)
            .ok_or_else(|| RepositoryError::Invalid("total".to_string()))?;
        let ids: Vec<i32> = lines.iter().map(|(id, _, _)| *id).collect();

        let id = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO orders (user_id, address, phone, total)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(user)
        .bind(address)
        .bind(phone)
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE items i
            SET order_id = $1, product_name = p.name, unit_price = p.price
            FROM products p
            WHERE p.id = i.product_id AND i.id = ANY($2)
            ",
        )
        .bind(id)
        .bind(ids.as_slice())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(order_id = id, user_id = %user, %total, lines = ids.len(), "Order placed");
        self.fetch(id).await.map(Some)
    }

    /// Change an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let updated =
            sqlx::query_scalar::<_, i32>("UPDATE orders SET status = $1 WHERE id = $2 RETURNING id")
                .bind(status)
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        match updated {
            Some(id) => self.fetch(id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Delete an order with its lines.
    ///
    /// Admins (`owner == None`) may delete any order. Owners may only delete
    /// their own orders while they are still `new`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn delete(
        &self,
        id: OrderId,
        owner: Option<UserId>,
    ) -> Result<OrderDeletion, RepositoryError> {
        let Some(owner) = owner else {
            let result = sqlx::query("DELETE FROM orders WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;
            return Ok(if result.rows_affected() > 0 {
                OrderDeletion::Deleted
            } else {
                OrderDeletion::NotFound
            });
        };

        let deleted = sqlx::query_scalar::<_, i32>(
            "DELETE FROM orders WHERE id = $1 AND user_id = $2 AND status = 'new' RETURNING id",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;
        if deleted.is_some() {
            return Ok(OrderDeletion::Deleted);
        }

        let status = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        Ok(status.map_or(OrderDeletion::NotFound, OrderDeletion::NotNew))
    }
}
