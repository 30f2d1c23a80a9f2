//! Cart lines.
//!
//! A cart is the set of a user's items with `order_id IS NULL`; every cart
//! operation is scoped that way so lines that moved into an order are no
//! longer reachable through `/items`.

use sqlx::{PgConnection, PgPool};

use shop_core::{ItemId, ProductId, UserId};

use super::RepositoryError;
use super::products::ProductRepository;
use super::query::{Field, FieldKind};
use super::resource::{Resource, ResourceRepository, Scope, SqlValue};
use crate::models::{Item, MAX_QUANTITY};

pub struct Items;

impl Resource for Items {
    type Id = ItemId;
    type Record = Item;

    const TABLE: &'static str = "items";
    const SINGULAR: &'static str = "item";
    const PLURAL: &'static str = "items";
    const SELECT: &'static str = "SELECT i.id, i.product_id, p.name AS product_name, \
         p.price AS product_price, p.image AS product_image, i.quantity, i.option, i.created_at \
         FROM items i JOIN products p ON p.id = i.product_id";
    const ID_COLUMN: &'static str = "i.id";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "i.id", FieldKind::Integer),
        Field::new("product", "i.product_id", FieldKind::Integer),
        Field::new("quantity", "i.quantity", FieldKind::Integer),
        Field::new("option", "i.option", FieldKind::Text),
        Field::new("createdAt", "i.created_at", FieldKind::Timestamp),
    ];
}

/// Restrict item queries to `user`'s cart.
#[must_use]
pub fn cart_scope(user: UserId) -> [Scope; 2] {
    [
        Scope::Eq("i.user_id", SqlValue::Int(user.as_i32())),
        Scope::IsNull("i.order_id"),
    ]
}

/// Take `user`'s cart lock for the rest of the transaction.
///
/// Checkout and add-to-cart both hold it, so a line is never added while a
/// checkout is moving the cart into an order.
pub(crate) async fn lock_cart(conn: &mut PgConnection, user: UserId) -> Result<(), RepositoryError> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
        .bind(user)
        .execute(conn)
        .await?;
    Ok(())
}

/// Outcome of adding a product to a cart.
#[derive(Debug)]
pub enum CartLine {
    /// The quantity was added to an existing line with the same option.
    Merged(Item),
    /// A new line was created.
    Created(Item),
}

/// Repository for cart mutations.
pub struct ItemRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ItemRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: i32) -> Result<Item, RepositoryError> {
        ResourceRepository::<Items>::new(self.pool)
            .get(ItemId::new(id), &[])
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("item {id} vanished after write")))
    }

    /// Add `quantity` of `product` to a cart, merging with an existing line
    /// that has the same option.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist,
    /// `RepositoryError::Invalid("quantity")` if the merged line would hold
    /// more than [`MAX_QUANTITY`] and `RepositoryError::Database` if a query
    /// fails.
    pub async fn add_to_cart(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
        option: Option<String>,
    ) -> Result<CartLine, RepositoryError> {
        if !ProductRepository::new(self.pool).exists(product).await? {
            return Err(RepositoryError::NotFound);
        }

        let mut tx = self.pool.begin().await?;
        lock_cart(&mut *tx, user).await?;

        let existing = sqlx::query_as::<_, (i32, i32)>(
            r"
            SELECT id, quantity FROM items
            WHERE user_id = $1 AND product_id = $2 AND order_id IS NULL
              AND option IS NOT DISTINCT FROM $3
            ORDER BY id
            LIMIT 1
            FOR UPDATE
            ",
        )
        .bind(user)
        .bind(product)
        .bind(option.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((id, current)) = existing {
            let merged = current
                .checked_add(quantity)
                .filter(|total| *total <= MAX_QUANTITY)
                .ok_or_else(|| RepositoryError::Invalid("quantity".to_string()))?;

            let updated = sqlx::query_scalar::<_, i32>(
                r"
                UPDATE items SET quantity = $1
                WHERE id = $2 AND user_id = $3 AND order_id IS NULL
                RETURNING id
                ",
            )
            .bind(merged)
            .bind(id)
            .bind(user)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(id) = updated {
                tx.commit().await?;
                return Ok(CartLine::Merged(self.fetch(id).await?));
            }
        }

        let id = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO items (product_id, quantity, option, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(product)
        .bind(quantity)
        .bind(option.as_deref())
        .bind(user)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CartLine::Created(self.fetch(id).await?))
    }

    /// Set the quantity of a line in `user`'s cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for quantities below 1 and
    /// `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        user: UserId,
        id: ItemId,
        quantity: i32,
    ) -> Result<Option<Item>, RepositoryError> {
        let updated = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE items SET quantity = $1
            WHERE id = $2 AND user_id = $3 AND order_id IS NULL
            RETURNING id
            ",
        )
        .bind(quantity)
        .bind(id)
        .bind(user)
        .fetch_optional(self.pool)
        .await?;

        match updated {
            Some(id) => self.fetch(id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Remove a line from `user`'s cart. Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user: UserId, id: ItemId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM items WHERE id = $1 AND user_id = $2 AND order_id IS NULL")
                .bind(id)
                .bind(user)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
