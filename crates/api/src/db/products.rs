//! Product resource and image bookkeeping.

use sqlx::PgPool;

use shop_core::{CategoryId, Price, ProductId};

use super::RepositoryError;
use super::query::{Field, FieldKind};
use super::resource::{Assignment, Resource, SqlValue, Writable};
use crate::models::{NewProduct, Product, UpdateProduct, ValidationError, Validator, non_blank};

const NAME_REQUIRED: &str = "A product must have a name";
const IMAGE_REQUIRED: &str = "A product must have an image";

pub struct Products;

impl Resource for Products {
    type Id = ProductId;
    type Record = Product;

    const TABLE: &'static str = "products";
    const SINGULAR: &'static str = "product";
    const PLURAL: &'static str = "products";
    const SELECT: &'static str = "SELECT p.id, p.name, p.description, p.price, p.image, \
         p.ratings_average, p.ratings_quantity, p.category_id, c.name AS category_name, \
         p.created_at \
         FROM products p LEFT JOIN categories c ON c.id = p.category_id";
    const ID_COLUMN: &'static str = "p.id";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "p.id", FieldKind::Integer),
        Field::new("name", "p.name", FieldKind::Text),
        Field::new("description", "p.description", FieldKind::Text),
        Field::new("price", "p.price", FieldKind::Decimal),
        Field::new("image", "p.image", FieldKind::Text),
        Field::new("ratingsAverage", "p.ratings_average", FieldKind::Float),
        Field::new("ratingsQuantity", "p.ratings_quantity", FieldKind::Integer),
        Field::new("category", "p.category_id", FieldKind::Integer),
        Field::new("createdAt", "p.created_at", FieldKind::Timestamp),
    ];
}

fn category_value(v: &mut Validator, raw: Option<String>) -> SqlValue {
    match non_blank(raw) {
        Some(raw) => v
            .check(raw.parse::<CategoryId>())
            .map_or(SqlValue::Null, |id| SqlValue::Int(id.as_i32())),
        None => SqlValue::Null,
    }
}

impl Writable for Products {
    type Create = NewProduct;
    type Update = UpdateProduct;

    fn create_values(input: NewProduct) -> Result<Vec<Assignment>, ValidationError> {
        let mut v = Validator::new();
        let name = v.required_text(input.name, NAME_REQUIRED);
        let price = v.check(input.price.unwrap_or_default().parse::<Price>());
        let image = v.required_text(input.image, IMAGE_REQUIRED);
        let category = category_value(&mut v, input.category);
        v.finish(())?;

        Ok(vec![
            ("name", SqlValue::Text(name.unwrap_or_default())),
            ("description", SqlValue::text_or_null(non_blank(input.description))),
            ("price", SqlValue::Decimal(price.unwrap_or_default().amount())),
            ("image", SqlValue::Text(image.unwrap_or_default())),
            ("category_id", category),
        ])
    }

    fn update_values(input: UpdateProduct) -> Result<Vec<Assignment>, ValidationError> {
        let mut v = Validator::new();
        let name = v.optional_text(input.name, NAME_REQUIRED);
        let price = input.price.and_then(|raw| v.check(raw.parse::<Price>()));
        let category = input.category.map(|raw| category_value(&mut v, raw));
        v.finish(())?;

        let mut values = Vec::new();
        if let Some(name) = name {
            values.push(("name", SqlValue::Text(name)));
        }
        if let Some(description) = input.description {
            values.push(("description", SqlValue::text_or_null(non_blank(description))));
        }
        if let Some(price) = price {
            values.push(("price", SqlValue::Decimal(price.amount())));
        }
        if let Some(image) = input.image {
            values.push(("image", SqlValue::Text(image)));
        }
        if let Some(category) = category {
            values.push(("category_id", category));
        }
        Ok(values)
    }
}

/// Product queries beyond the generic resource operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether a product exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Stored image file name of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn image(&self, id: ProductId) -> Result<Option<String>, RepositoryError> {
        let image = sqlx::query_scalar::<_, String>("SELECT image FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(image)
    }

    /// Delete a product and the cart lines holding it, returning the image
    /// file it used. Order lines keep their name and price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn delete(&self, id: ProductId) -> Result<Option<String>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Blocks new cart lines for the product until the delete commits
        sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM items WHERE product_id = $1 AND order_id IS NULL")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let image =
            sqlx::query_scalar::<_, String>("DELETE FROM products WHERE id = $1 RETURNING image")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(image)
    }
}
