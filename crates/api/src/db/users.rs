//! User repository for database operations.
//!
//! Deactivated accounts (`active = false`) are invisible to every lookup.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shop_core::{Email, Role, UserId};

use super::RepositoryError;
use super::query::{Field, FieldKind};
use super::resource::Resource;
use crate::models::User;

const USER_COLUMNS: &str = "u.id, u.name, u.email, u.photo, u.role, u.password_changed_at, u.created_at";

pub struct Users;

impl Resource for Users {
    type Id = UserId;
    type Record = User;

    const TABLE: &'static str = "users";
    const SINGULAR: &'static str = "user";
    const PLURAL: &'static str = "users";
    const SELECT: &'static str = "SELECT u.id, u.name, u.email, u.photo, u.role, \
         u.password_changed_at, u.created_at FROM users u";
    const ID_COLUMN: &'static str = "u.id";
    const SCOPE: &'static str = "u.active";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "u.id", FieldKind::Integer),
        Field::new("name", "u.name", FieldKind::Text),
        Field::new("email", "u.email", FieldKind::Text),
        Field::new("photo", "u.photo", FieldKind::Text),
        Field::new(
            "role",
            "u.role",
            FieldKind::Enum {
                type_name: "user_role",
                variants: &["user", "admin"],
            },
        ),
        Field::new("createdAt", "u.created_at", FieldKind::Timestamp),
    ];
}

/// Profile fields a user may change themselves.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub photo: Option<String>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an active user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1 AND u.active"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Get an active user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1 AND u.active"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Create a user with a password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
        role: Role,
    ) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users AS u (name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(self.pool)
        .await?;
        Ok(user)
    }

    /// Get the password hash of an active user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM users WHERE id = $1 AND active",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(hash)
    }

    /// Replace a password, stamping `password_changed_at` one second in the
    /// past so a token issued in the same second stays valid. Clears any
    /// pending reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_password(&self, id: UserId, password_hash: &str) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users AS u SET password_hash = $1, \
                 password_changed_at = now() - interval '1 second', \
                 password_reset_token = NULL, password_reset_expires = NULL \
             WHERE u.id = $2 AND u.active RETURNING {USER_COLUMNS}"
        ))
        .bind(password_hash)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Store the hash of an issued password reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_reset_token(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE users SET password_reset_token = $1, password_reset_expires = $2 WHERE id = $3",
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Forget a pending password reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_reset_token(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Find the active user holding an unexpired reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u \
             WHERE u.password_reset_token = $1 AND u.password_reset_expires > now() AND u.active"
        ))
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Apply a self-service profile update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new email is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users AS u SET name = COALESCE($1, name), email = COALESCE($2, email), \
                 photo = COALESCE($3, photo) \
             WHERE u.id = $4 AND u.active RETURNING {USER_COLUMNS}"
        ))
        .bind(update.name)
        .bind(update.email)
        .bind(update.photo)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Deactivate an account. Returns `true` if an active account was found.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET active = FALSE WHERE id = $1 AND active")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change the role of the account with `email`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_role(&self, email: &Email, role: Role) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users AS u SET role = $1 WHERE u.email = $2 AND u.active RETURNING {USER_COLUMNS}"
        ))
        .bind(role)
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }
}
