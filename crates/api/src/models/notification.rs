//! Store-wide notifications (announcements).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shop_core::NotificationId;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNotification {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNotification {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::deserialize_nullable")]
    pub content: Option<Option<String>>,
}
