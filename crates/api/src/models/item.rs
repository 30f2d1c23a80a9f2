//! Cart and order lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;

use shop_core::{ItemId, Price, ProductId};

/// Largest quantity a cart line may hold.
pub const MAX_QUANTITY: i32 = 10_000;

/// The part of a product shown on a cart or order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub product: ProductSummary,
    pub quantity: i32,
    pub option: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for Item {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            product: ProductSummary {
                id: row.try_get("product_id")?,
                name: row.try_get("product_name")?,
                price: row.try_get("product_price")?,
                image: row.try_get("product_image")?,
            },
            quantity: row.try_get("quantity")?,
            option: row.try_get("option")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Add-to-cart payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewItem {
    pub product: Option<ProductId>,
    pub quantity: Option<i32>,
    pub option: Option<String>,
}

/// Cart line edit: only the quantity can change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItem {
    pub quantity: Option<i32>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_json() {
        let item = Item {
            id: ItemId::new(1),
            product: ProductSummary {
                id: ProductId::new(2),
                name: "Hat".into(),
                price: "12.50".parse().unwrap(),
                image: "hat.jpg".into(),
            },
            quantity: 3,
            option: Some("L".into()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["product"]["name"], "Hat");
        assert_eq!(json["option"], "L");
    }

    #[test]
    fn test_new_item_payload() {
        let item: NewItem = serde_json::from_str(r#"{"product":7}"#).unwrap();
        assert_eq!(item.product, Some(ProductId::new(7)));
        assert_eq!(item.quantity, None);
        assert!(serde_json::from_str::<NewItem>(r#"{"product":"seven"}"#).is_err());
    }
}
