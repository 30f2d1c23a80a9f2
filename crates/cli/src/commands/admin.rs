//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create an admin account
//! shop-cli admin create -e admin@example.com -n "Admin Name" -p 'long-password'
//!
//! # Give an existing account the admin role
//! shop-cli user promote -e someone@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `SHOP_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use shop_api::db::RepositoryError;
use shop_api::db::users::UserRepository;
use shop_api::services::auth::{AuthError, MIN_PASSWORD_LENGTH, hash_password};
use shop_core::{Email, Role, UserId};

use super::{MissingDatabaseUrl, database_url};

/// Errors that can occur during user management.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Config(#[from] MissingDatabaseUrl),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    #[error("Password hashing failed: {0}")]
    Hash(#[from] AuthError),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error("No active user with email: {0}")]
    UnknownUser(String),
}

fn parse_email(email: &str) -> Result<Email, AdminError> {
    Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))
}

async fn connect() -> Result<PgPool, AdminError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}

/// Create a new admin account.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `AdminError` for invalid input, an existing account or database
/// failures.
pub async fn create_admin(email: &str, name: &str, password: &str) -> Result<UserId, AdminError> {
    let email = parse_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AdminError::WeakPassword);
    }

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    if users.get_by_email(&email).await?.is_some() {
        return Err(AdminError::UserExists(email.into_inner()));
    }

    tracing::info!("Creating admin user: {}", email);
    let password_hash = hash_password(password)?;
    let user = users
        .create(name.trim(), &email, &password_hash, Role::Admin)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if no active account has `email`.
pub async fn promote(email: &str) -> Result<UserId, AdminError> {
    let email = parse_email(email)?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, Role::Admin)
        .await?
        .ok_or_else(|| AdminError::UnknownUser(email.to_string()))?;

    tracing::info!("Promoted {} (ID: {}) to admin", user.email, user.id);
    Ok(user.id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email() {
        assert!(parse_email("admin@example.com").is_ok());
        assert!(matches!(
            parse_email("nope"),
            Err(AdminError::InvalidEmail(raw)) if raw == "nope"
        ));
    }

    #[tokio::test]
    async fn test_weak_password_rejected_before_connecting() {
        let err = create_admin("admin@example.com", "Admin", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::WeakPassword));
    }
}
