//! Catalog products.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::postgres::PgRow;

use shop_core::{CategoryId, Price, ProductId};

use super::CategoryRef;

/// A product with its category embedded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub image: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub category: Option<CategoryRef>,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for Product {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let category_id: Option<CategoryId> = row.try_get("category_id")?;
        let category_name: Option<String> = row.try_get("category_name")?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            image: row.try_get("image")?,
            ratings_average: row.try_get("ratings_average")?,
            ratings_quantity: row.try_get("ratings_quantity")?,
            category: category_id
                .zip(category_name)
                .map(|(id, name)| CategoryRef { id, name }),
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Text fields of a product creation form. `image` is the stored file name,
/// filled in once the upload has been written.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}

/// Product edit form. For `description` and `category`, an empty form value
/// clears the column (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<String>,
    pub category: Option<Option<String>>,
    pub image: Option<String>,
}

impl UpdateProduct {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.image.is_none()
    }
}
