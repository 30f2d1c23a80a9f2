//! Database access for the shop `PostgreSQL` schema.
//!
//! # Tables
//!
//! - `users` - Accounts, password hashes, reset tokens
//! - `categories`, `products`, `notifications` - Catalog
//! - `items` - Cart lines (`order_id IS NULL`) and order lines
//! - `orders` - Checked out carts
//! - `reviews` - Product reviews, feeding the product rating aggregate
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p shop-cli -- migrate
//! ```

pub mod categories;
pub mod items;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod query;
pub mod resource;
pub mod reviews;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use query::{ListQuery, QueryError};
pub use resource::{Resource, ResourceRepository, Scope, SqlValue, Writable};

/// SQLSTATE for integer and numeric overflow.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation, carrying the offending field.
    #[error("duplicate value for {0}")]
    Conflict(String),

    /// Foreign key violation, carrying the referencing field.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Check constraint violation.
    #[error("constraint violation: {0}")]
    Invalid(String),

    /// List query referenced an unknown field or carried a bad value.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            let constraint = db_err.constraint().unwrap_or_default();
            if db_err.is_unique_violation() {
                return Self::Conflict(constraint_field(constraint, "_key"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::InvalidReference(constraint_field(constraint, "_fkey"));
            }
            if db_err.is_check_violation() {
                return Self::Invalid(constraint_field(constraint, "_check"));
            }
            if db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) {
                return Self::Invalid("number: out of range".to_string());
            }
        }
        Self::Database(err)
    }
}

/// Field name from a conventional constraint name, e.g. `users_email_key` -> `email`.
fn constraint_field(constraint: &str, suffix: &str) -> String {
    let trimmed = constraint.strip_suffix(suffix).unwrap_or(constraint);
    trimmed
        .split_once('_')
        .map_or(trimmed, |(_table, field)| field)
        .to_string()
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
