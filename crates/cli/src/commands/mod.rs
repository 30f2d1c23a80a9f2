//! Subcommand implementations.

pub mod admin;
pub mod migrate;

use secrecy::SecretString;

/// Missing database configuration.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: SHOP_DATABASE_URL (or DATABASE_URL)")]
pub struct MissingDatabaseUrl;

/// `SHOP_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// Loads `.env` first if present.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();

    ["SHOP_DATABASE_URL", "DATABASE_URL"]
        .into_iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
        .map(SecretString::from)
        .ok_or(MissingDatabaseUrl)
}
