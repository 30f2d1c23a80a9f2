//! Orders placed from a cart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;
use sqlx::types::Json;

use shop_core::{Email, ItemId, OrderId, OrderStatus, Price, ProductId, UserId};

/// The buyer as shown on an order.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: Email,
}

/// The product as it was bought. `id` and `image` are gone once the product
/// is deleted; name and price are kept from checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedProduct {
    pub id: Option<ProductId>,
    pub name: String,
    pub price: Price,
    pub image: Option<String>,
}

/// A line moved from the cart into an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: ItemId,
    pub product: OrderedProduct,
    pub quantity: i32,
    pub option: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user: UserSummary,
    pub address: String,
    pub phone: String,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub total: Price,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for Order {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let Json(items): Json<Vec<OrderLine>> = row.try_get("items")?;

        Ok(Self {
            id: row.try_get("id")?,
            user: UserSummary {
                id: row.try_get("user_id")?,
                name: row.try_get("user_name")?,
                email: row.try_get("user_email")?,
            },
            address: row.try_get("address")?,
            phone: row.try_get("phone")?,
            status: row.try_get("status")?,
            items,
            total: row.try_get("total")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Checkout payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrder {
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Admin order edit: only the status can change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrder {
    pub status: Option<String>,
}
