//! Authentication service.
//!
//! Password accounts with RS256 session tokens and emailed reset links.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use shop_core::{Email, Role};

use super::email::EmailService;
use super::token::JwtKeys;
use crate::db::users::UserRepository;
use crate::models::{NewUser, User, Validator};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// How long an emailed reset link stays valid.
const RESET_TOKEN_LIFETIME_MINUTES: i64 = 10;

/// A signed-in user and their fresh session token.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// New password plus its confirmation.
#[derive(Debug, Clone, Copy)]
pub struct PasswordChange<'p> {
    pub password: Option<&'p str>,
    pub confirm_password: Option<&'p str>,
}

/// Authentication service.
///
/// Handles signup, signin, token verification and password changes.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    keys: &'a JwtKeys,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, keys: &'a JwtKeys) -> Self {
        Self {
            users: UserRepository::new(pool),
            keys,
        }
    }

    fn session(&self, user: User) -> Result<Session, AuthError> {
        let token = self.keys.issue(user.id)?;
        Ok(Session { user, token })
    }

    /// Register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` listing every broken rule and
    /// `AuthError::Repository` with a conflict if the email is taken.
    pub async fn signup(&self, input: NewUser) -> Result<Session, AuthError> {
        let mut v = Validator::new();
        let name = v.required_text(input.name, "Please tell us your name!");
        let email = v.check(Email::parse(input.email.as_deref().unwrap_or_default()));
        let password = validate_new_password(
            &mut v,
            PasswordChange {
                password: input.password.as_deref(),
                confirm_password: input.confirm_password.as_deref(),
            },
        );
        v.finish(())?;

        let (Some(name), Some(email), Some(password)) = (name, email, password) else {
            return Err(AuthError::MissingCredentials);
        };

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create(&name, &email, &password_hash, Role::User)
            .await?;

        tracing::info!(user_id = %user.id, "User signed up");
        self.session(user)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` if either value is absent and
    /// `AuthError::InvalidCredentials` if they do not match an account.
    pub async fn signin(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<Session, AuthError> {
        let (Some(email), Some(password)) = (
            email.filter(|e| !e.trim().is_empty()),
            password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AuthError::MissingCredentials);
        };

        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let password_hash = self
            .users
            .get_password_hash(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &password_hash)?;

        self.session(user)
    }

    /// Resolve a session token to its active user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` or `AuthError::ExpiredToken` for
    /// tokens that fail verification, `AuthError::UserGone` if the account is
    /// gone or inactive and `AuthError::PasswordChanged` if the password
    /// changed after the token was issued.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.keys.verify(token)?;
        let user = self
            .users
            .get_by_id(claims.user_id()?)
            .await?
            .ok_or(AuthError::UserGone)?;

        if user.changed_password_after(claims.iat) {
            return Err(AuthError::PasswordChanged);
        }
        Ok(user)
    }

    /// Change the password of a signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WrongPassword` if `current` does not match and
    /// `AuthError::Validation` if the new password breaks a rule.
    pub async fn update_password(
        &self,
        user: &User,
        current: Option<&str>,
        change: PasswordChange<'_>,
    ) -> Result<Session, AuthError> {
        let password_hash = self
            .users
            .get_password_hash(user.id)
            .await?
            .ok_or(AuthError::UserGone)?;
        verify_password(current.unwrap_or_default(), &password_hash)
            .map_err(|_| AuthError::WrongPassword)?;

        let password = checked_password(change)?;
        let user = self
            .users
            .set_password(user.id, &hash_password(password)?)
            .await?;

        tracing::info!(user_id = %user.id, "Password updated");
        self.session(user)
    }

    /// Issue a reset token and email the reset link.
    ///
    /// The token is cleared again if the email cannot be delivered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownEmail` if no active account has `email` and
    /// `AuthError::EmailDelivery` if the link could not be sent.
    pub async fn forgot_password(
        &self,
        email: Option<&str>,
        mailer: Option<&EmailService>,
        base_url: &str,
    ) -> Result<(), AuthError> {
        let user = match Email::parse(email.unwrap_or_default()) {
            Ok(email) => self.users.get_by_email(&email).await?,
            Err(_) => None,
        }
        .ok_or(AuthError::UnknownEmail)?;

        let (token, token_hash) = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_LIFETIME_MINUTES);
        self.users
            .set_reset_token(user.id, &token_hash, expires_at)
            .await?;

        let reset_url = format!(
            "{}/api/v1/users/reset-password/{token}",
            base_url.trim_end_matches('/')
        );
        let sent = match mailer {
            Some(mailer) => mailer
                .send_password_reset(user.email.as_str(), &user.name, &reset_url)
                .await
                .map_err(|e| tracing::error!(user_id = %user.id, error = %e, "Password reset email failed")),
            None => {
                tracing::error!(user_id = %user.id, "Password reset requested but email is not configured");
                Err(())
            }
        };

        if sent.is_err() {
            self.users.clear_reset_token(user.id).await?;
            return Err(AuthError::EmailDelivery);
        }
        Ok(())
    }

    /// Set a new password using an emailed reset token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if the token is unknown or
    /// expired and `AuthError::Validation` if the new password breaks a rule.
    pub async fn reset_password(
        &self,
        token: &str,
        change: PasswordChange<'_>,
    ) -> Result<Session, AuthError> {
        let user = self
            .users
            .get_by_reset_token(&hash_reset_token(token))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let password = checked_password(change)?;
        let user = self
            .users
            .set_password(user.id, &hash_password(password)?)
            .await?;

        tracing::info!(user_id = %user.id, "Password reset");
        self.session(user)
    }
}

/// Apply the password rules, recording violations in `v`.
fn validate_new_password<'p>(v: &mut Validator, change: PasswordChange<'p>) -> Option<&'p str> {
    let password = match change.password {
        Some(p) if p.chars().count() >= MIN_PASSWORD_LENGTH => Some(p),
        Some(_) => {
            v.error(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            ));
            None
        }
        None => {
            v.error("Please provide a password");
            None
        }
    };

    match change.confirm_password {
        None => v.error("Please confirm your password"),
        Some(confirm) if change.password != Some(confirm) => {
            v.error("Passwords are not the same!");
        }
        Some(_) => {}
    }
    password
}

fn checked_password(change: PasswordChange<'_>) -> Result<&str, AuthError> {
    let mut v = Validator::new();
    let password = validate_new_password(&mut v, change);
    v.finish(())?;
    password.ok_or(AuthError::MissingCredentials)
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// A random reset token and the SHA-256 hex digest stored for it.
fn generate_reset_token() -> (String, String) {
    let token = hex::encode(rand::random::<[u8; 32]>());
    let hash = hash_reset_token(&token);
    (token, hash)
}

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
