//! Product categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shop_core::CategoryId;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Category embedded in a product.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategory {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Partial update; `"description": null` clears the description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategory {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::deserialize_nullable")]
    pub description: Option<Option<String>>,
}
