//! User account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shop_core::{Email, Role, UserId};

/// A user account as returned by the API.
///
/// Password material never leaves the server: the hash and reset token are
/// not part of this type and `password_changed_at` is not serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub photo: String,
    pub role: Role,
    #[serde(skip)]
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the password changed after a token issued at `issued_at`
    /// (unix seconds).
    #[must_use]
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| changed.timestamp() > issued_at)
    }
}

/// Signup payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "passwordConfirm")]
    pub confirm_password: Option<String>,
}
