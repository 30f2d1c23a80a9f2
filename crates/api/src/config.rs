//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `JWT_PRIVATE_KEY` - RSA private key (PEM) used to sign tokens
//! - `JWT_PUBLIC_KEY` - RSA public key (PEM) used to verify tokens
//!
//! PEM values may be given on one line with literal `\n` separators.
//!
//! ## Optional
//! - `SHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOP_PORT` - Listen port (default: 4000)
//! - `SHOP_BASE_URL` - Public URL used in emailed links (default: <http://127.0.0.1:4000>)
//! - `JWT_EXPIRES_IN_DAYS` - Token lifetime (default: 90)
//! - `JWT_COOKIE_EXPIRES_IN_DAYS` - `jwt` cookie lifetime (default: 90)
//! - `SHOP_COOKIE_SECURE` - Always mark the cookie `Secure` (default: false)
//! - `UPLOAD_DIR` - Root directory for uploaded images (default: public/images)
//! - `SHOP_RATE_LIMIT` - Enable per-IP rate limiting (default: true)
//! - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   outgoing mail; email is disabled unless `SMTP_HOST` is set
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Sentry error tracking

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, used to build password reset links
    pub base_url: String,
    pub jwt: JwtConfig,
    /// Mark the `jwt` cookie `Secure` even for plain HTTP requests
    pub cookie_secure: bool,
    /// Root of the uploaded image tree (`products/` and `users/` live below it)
    pub upload_dir: PathBuf,
    pub rate_limit: bool,
    /// Outgoing mail, `None` when `SMTP_HOST` is not set
    pub email: Option<EmailConfig>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Token signing configuration.
///
/// Implements `Debug` manually to redact the private key.
#[derive(Clone)]
pub struct JwtConfig {
    pub private_key: SecretString,
    pub public_key: String,
    pub expires_in_days: i64,
    pub cookie_expires_in_days: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("private_key", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .field("expires_in_days", &self.expires_in_days)
            .field("cookie_expires_in_days", &self.cookie_expires_in_days)
            .finish()
    }
}

/// SMTP configuration for transactional email.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    /// Sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(&Env(|key: &str| std::env::var(key).ok()))
    }

    fn from_source<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        let database_url = env.get_database_url("SHOP_DATABASE_URL")?;
        let host = env.get_parsed::<IpAddr>("SHOP_HOST", "127.0.0.1")?;
        let port = env.get_parsed::<u16>("SHOP_PORT", "4000")?;
        let base_url = env
            .get_env_or_default("SHOP_BASE_URL", &format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        let jwt = JwtConfig {
            private_key: SecretString::from(expand_pem_newlines(
                &env.get_required_env("JWT_PRIVATE_KEY")?,
            )),
            public_key: expand_pem_newlines(&env.get_required_env("JWT_PUBLIC_KEY")?),
            expires_in_days: env.get_positive("JWT_EXPIRES_IN_DAYS", "90")?,
            cookie_expires_in_days: env.get_positive("JWT_COOKIE_EXPIRES_IN_DAYS", "90")?,
        };

        let email = match env.get_optional_env("SMTP_HOST") {
            Some(smtp_host) => Some(EmailConfig {
                smtp_host,
                smtp_port: env.get_parsed::<u16>("SMTP_PORT", "587")?,
                smtp_username: env.get_optional_env("SMTP_USERNAME"),
                smtp_password: env.get_optional_env("SMTP_PASSWORD").map(SecretString::from),
                from_address: env.get_required_env("EMAIL_FROM")?,
            }),
            None => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            jwt,
            cookie_secure: env.get_bool("SHOP_COOKIE_SECURE", false)?,
            upload_dir: PathBuf::from(env.get_env_or_default("UPLOAD_DIR", "public/images")),
            rate_limit: env.get_bool("SHOP_RATE_LIMIT", true)?,
            email,
            sentry_dsn: env.get_optional_env("SENTRY_DSN"),
            sentry_environment: env.get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup, `std::env` in production and a map in tests.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get a required, non-empty environment variable.
    fn get_required_env(&self, key: &str) -> Result<String, ConfigError> {
        self.get_optional_env(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional environment variable. Empty values count as unset.
    fn get_optional_env(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get an environment variable with a default value.
    fn get_env_or_default(&self, key: &str, default: &str) -> String {
        self.get_optional_env(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn get_database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.get_optional_env(primary_key)
            .or_else(|| self.get_optional_env("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    fn get_parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_env_or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn get_positive(&self, key: &str, default: &str) -> Result<i64, ConfigError> {
        let value = self.get_parsed::<i64>(key, default)?;
        if value < 1 {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("must be at least 1 (got {value})"),
            ));
        }
        Ok(value)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get_optional_env(key) {
            None => Ok(default),
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar(key.to_string(), format!("expected a boolean, got {raw}"))
            }),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Turn literal `\n` sequences into newlines so a PEM fits in one env line.
fn expand_pem_newlines(raw: &str) -> String {
    raw.trim().trim_matches('"').replace("\\n", "\n")
}
