//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"status":"fail","message":...}` for client errors and
//! `{"status":"error","message":...}` for server errors; server errors are
//! captured to Sentry and logged before responding.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use shop_core::InvalidId;

use crate::db::{QueryError, RepositoryError};
use crate::models::ValidationError;
use crate::services::auth::AuthError;
use crate::services::uploads::UploadError;

const INTERNAL_MESSAGE: &str = "Something went very wrong!";

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or authorization failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payload broke one or more rules.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Image upload rejected or not stored.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Request body over the route's size limit.
    #[error("Request body is too large")]
    PayloadTooLarge,

    /// Rate limited.
    #[error("Too many requests from this IP, please try again later!")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<InvalidId> for AppError {
    fn from(err: InvalidId) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge;
        }
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

fn repository_status(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
        RepositoryError::Conflict(field) => (
            StatusCode::BAD_REQUEST,
            format!("Duplicate field value: {field}. Please use another value!"),
        ),
        RepositoryError::InvalidReference(field) => (
            StatusCode::BAD_REQUEST,
            format!("Invalid reference: {field}"),
        ),
        RepositoryError::Invalid(field) => (
            StatusCode::BAD_REQUEST,
            format!("Invalid input data. Invalid {field}"),
        ),
        RepositoryError::Query(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_MESSAGE.to_string(),
        ),
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    let status = match err {
        AuthError::MissingCredentials
        | AuthError::InvalidResetToken
        | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials
        | AuthError::NotLoggedIn
        | AuthError::InvalidToken
        | AuthError::ExpiredToken
        | AuthError::UserGone
        | AuthError::PasswordChanged
        | AuthError::WrongPassword => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::UnknownEmail => StatusCode::NOT_FOUND,
        AuthError::EmailDelivery => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::Repository(err) => return repository_status(err),
        AuthError::Token(_) | AuthError::PasswordHash => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            );
        }
    };
    (status, err.to_string())
}

impl AppError {
    /// Status code and client-facing message.
    ///
    /// Internal details never reach the client.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => auth_status(err),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Upload(err @ UploadError::NotAnImage) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Self::Upload(UploadError::Io(_)) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            ),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = json!({
            "status": if status.is_client_error() { "fail" } else { "error" },
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_client_errors_fail() {
        let (status, body) = render(AppError::NotFound("No product found with that ID".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "No product found with that ID");
    }

    #[tokio::test]
    async fn test_duplicate_field() {
        let (status, body) =
            render(RepositoryError::Conflict("email".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Duplicate field value: email. Please use another value!"
        );
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, body) = render(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], INTERNAL_MESSAGE);

        let (status, body) =
            render(RepositoryError::DataCorruption("bad row".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("bad row"));
    }

    #[tokio::test]
    async fn test_auth_status_codes() {
        let cases = [
            (AuthError::MissingCredentials, StatusCode::BAD_REQUEST),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::NotLoggedIn, StatusCode::UNAUTHORIZED),
            (AuthError::PasswordChanged, StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (AuthError::UnknownEmail, StatusCode::NOT_FOUND),
            (AuthError::InvalidResetToken, StatusCode::BAD_REQUEST),
            (AuthError::EmailDelivery, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let message = err.to_string();
            let (status, body) = render(err.into()).await;
            assert_eq!(status, expected, "{message}");
            assert_eq!(body["message"], message);
        }
    }

    #[tokio::test]
    async fn test_validation_and_query_errors() {
        let (status, body) = render(ValidationError::single("A product must have a name").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid input data. A product must have a name");

        let (status, body) = render(QueryError::UnknownField("secret".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid field: secret");

        let (_, body) = render(InvalidId("abc".into()).into()).await;
        assert_eq!(body["message"], "Invalid id: abc");
    }

    #[tokio::test]
    async fn test_upload_errors() {
        let (status, body) = render(UploadError::NotAnImage.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Not an image! Please upload only images.");
    }

    #[test]
    fn test_rate_limited_status() {
        assert_eq!(
            AppError::RateLimited.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
