//! Application state shared across handlers.

use std::sync::Arc;

use lettre::transport::smtp::Error as SmtpError;
use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::email::EmailService;
use crate::services::token::{JwtKeys, TokenError};
use crate::services::uploads::UploadStore;

/// Error building the application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid JWT keys: {0}")]
    Jwt(#[from] TokenError),
    #[error("invalid SMTP configuration: {0}")]
    Smtp(#[from] SmtpError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    jwt: JwtKeys,
    email: Option<EmailService>,
    uploads: UploadStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWT keys do not parse or the SMTP relay
    /// cannot be configured.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let jwt = JwtKeys::from_config(&config.jwt)?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;
        let uploads = UploadStore::new(config.upload_dir.clone());

        if email.is_none() {
            tracing::warn!("SMTP_HOST not set; password reset emails are disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                jwt,
                email,
                uploads,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the token signing and verification keys.
    #[must_use]
    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }

    /// Get the email service, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Get the image upload store.
    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }
}
