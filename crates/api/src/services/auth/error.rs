//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::ValidationError;
use crate::services::token::TokenError;

/// Errors that can occur during authentication operations.
///
/// The display text of the client-facing variants is the message returned in
/// the response body.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please provide email and password!")]
    MissingCredentials,

    /// Wrong password or unknown email.
    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("You are not logged in! Please log in to get access.")]
    NotLoggedIn,

    #[error("Invalid token. Please log in again!")]
    InvalidToken,

    #[error("Your token has expired! Please log in again.")]
    ExpiredToken,

    /// The token's user was deleted or deactivated.
    #[error("The user belonging to this token does no longer exist.")]
    UserGone,

    #[error("User recently changed password! Please log in again.")]
    PasswordChanged,

    #[error("Your current password is wrong.")]
    WrongPassword,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("There is no user with email address.")]
    UnknownEmail,

    #[error("Token is invalid or has expired")]
    InvalidResetToken,

    #[error("There was an error sending the email. Try again later!")]
    EmailDelivery,

    /// Signup or password payload broke a rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Signing keys or token encoding failed.
    #[error("token error: {0}")]
    Token(TokenError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::ExpiredToken,
            TokenError::Invalid => Self::InvalidToken,
            other => Self::Token(other),
        }
    }
}
