//! Account and authentication handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use shop_core::{Email, UserId};

use super::{discard_upload, factory, response};
use crate::db::ListQuery;
use crate::db::users::{ProfileUpdate, UserRepository, Users};
use crate::error::{AppError, Result, clear_sentry_user};
use crate::extract::{ApiJson, MultipartForm, PathId};
use crate::middleware::{RequireAdmin, RequireAuth, logout_cookie, session_cookie};
use crate::models::{NewUser, User, Validator};
use crate::services::auth::{AuthError, AuthService, PasswordChange, Session};
use crate::services::uploads::UploadKind;
use crate::state::AppState;

/// Multipart fields that must go through `/update-my-password` instead.
const PASSWORD_FIELDS: [&str; 3] = ["password", "confirmPassword", "passwordConfirm"];

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    password: Option<String>,
    #[serde(alias = "passwordConfirm")]
    confirm_password: Option<String>,
}

impl ResetPasswordRequest {
    fn change(&self) -> PasswordChange<'_> {
        PasswordChange {
            password: self.password.as_deref(),
            confirm_password: self.confirm_password.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(alias = "currentPassword")]
    password_current: Option<String>,
    #[serde(flatten)]
    new_password: ResetPasswordRequest,
}

type SessionResponse = (StatusCode, CookieJar, Json<Value>);

/// Token body plus the `jwt` cookie.
fn send_session(
    state: &AppState,
    headers: &HeaderMap,
    status: StatusCode,
    session: Session,
) -> Result<SessionResponse> {
    let body = response::with_token(&session.token, &session.user)?;
    let cookie = session_cookie(
        session.token,
        state.config().jwt.cookie_expires_in_days,
        state.config().cookie_secure,
        headers,
    );
    Ok((status, CookieJar::new().add(cookie), body))
}

/// `POST /users/signup`
#[tracing::instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<NewUser>,
) -> Result<SessionResponse> {
    let session = AuthService::new(state.pool(), state.jwt())
        .signup(input)
        .await?;
    send_session(&state, &headers, StatusCode::CREATED, session)
}

/// `POST /users/signin`
#[tracing::instrument(skip_all)]
pub async fn signin(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<SigninRequest>,
) -> Result<SessionResponse> {
    let session = AuthService::new(state.pool(), state.jwt())
        .signin(input.email.as_deref(), input.password.as_deref())
        .await
        .inspect_err(|e| {
            if matches!(e, AuthError::InvalidCredentials) {
                tracing::warn!("Failed sign-in attempt");
            }
        })?;

    tracing::info!(user_id = %session.user.id, "User signed in");
    send_session(&state, &headers, StatusCode::OK, session)
}

/// `GET /users/logout`
pub async fn logout() -> (CookieJar, Json<Value>) {
    clear_sentry_user();
    (
        CookieJar::new().add(logout_cookie()),
        Json(json!({ "status": "success" })),
    )
}

/// `POST /users/forgot-password`
#[tracing::instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.jwt())
        .forgot_password(
            input.email.as_deref(),
            state.email(),
            &state.config().base_url,
        )
        .await?;
    Ok(response::message("Token sent to email!"))
}

/// `PATCH /users/reset-password/{token}`
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
    ApiJson(input): ApiJson<ResetPasswordRequest>,
) -> Result<SessionResponse> {
    let session = AuthService::new(state.pool(), state.jwt())
        .reset_password(&token, input.change())
        .await?;
    send_session(&state, &headers, StatusCode::OK, session)
}

/// `PATCH /users/update-my-password`
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    RequireAuth(user): RequireAuth,
    ApiJson(input): ApiJson<UpdatePasswordRequest>,
) -> Result<SessionResponse> {
    let session = AuthService::new(state.pool(), state.jwt())
        .update_password(
            &user,
            input.password_current.as_deref(),
            input.new_password.change(),
        )
        .await?;
    send_session(&state, &headers, StatusCode::OK, session)
}

/// `GET /users/me`
pub async fn me(RequireAuth(user): RequireAuth) -> Result<Json<Value>> {
    response::one("user", user)
}

/// Validate the text fields of an `update-me` form.
fn profile_update(form: &mut MultipartForm) -> Result<ProfileUpdate> {
    if PASSWORD_FIELDS.iter().any(|field| form.has(field)) {
        return Err(AppError::BadRequest(
            "This route is not for password updates. Please use /update-my-password.".to_string(),
        ));
    }

    let mut v = Validator::new();
    let name = v.optional_text(form.take("name"), "Please tell us your name!");
    let email = form
        .take("email")
        .and_then(|raw| v.check(Email::parse(&raw)));
    v.finish(ProfileUpdate {
        name,
        email,
        photo: None,
    })
    .map_err(AppError::from)
}

/// `PATCH /users/update-me` (multipart: `name`, `email`, `photo`)
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let mut form = MultipartForm::read(multipart, "photo").await?;
    let mut update = profile_update(&mut form)?;

    if let Some(file) = form.file {
        let photo = state
            .uploads()
            .save(
                UploadKind::User,
                user.id,
                file.content_type.as_deref(),
                &file.bytes,
            )
            .await?;
        update.photo = Some(photo);
    }

    let new_photo = update.photo.clone();
    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, update)
        .await;

    let updated = match updated {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            discard_upload(&state, UploadKind::User, new_photo.as_deref()).await;
            return Err(AuthError::UserGone.into());
        }
        Err(e) => {
            discard_upload(&state, UploadKind::User, new_photo.as_deref()).await;
            return Err(e.into());
        }
    };

    if new_photo.is_some() {
        state.uploads().remove(UploadKind::User, &user.photo).await;
    }
    response::one("user", updated)
}

/// `DELETE /users/delete-me`
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn delete_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<(CookieJar, StatusCode)> {
    UserRepository::new(state.pool()).deactivate(user.id).await?;
    tracing::info!("Account deactivated");
    Ok((CookieJar::new().add(logout_cookie()), StatusCode::NO_CONTENT))
}

/// `GET /users` (admin)
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    query: ListQuery,
) -> Result<Json<Value>> {
    factory::list_records::<Users>(state.pool(), &query, &[]).await
}

/// `GET /users/{id}` (admin)
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    PathId(id): PathId<UserId>,
) -> Result<Json<Value>> {
    let user: User = factory::one_record::<Users>(state.pool(), id, &[]).await?;
    response::one("user", user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_password_request_aliases() {
        let input: UpdatePasswordRequest = serde_json::from_str(
            r#"{"passwordCurrent":"old-secret","password":"new-secret","passwordConfirm":"new-secret"}"#,
        )
        .unwrap();
        assert_eq!(input.password_current.as_deref(), Some("old-secret"));
        let change = input.new_password.change();
        assert_eq!(change.password, Some("new-secret"));
        assert_eq!(change.confirm_password, Some("new-secret"));
    }

    #[test]
    fn test_profile_update_rejects_password_fields() {
        let mut form = MultipartForm::default();
        form.insert("password", "hunter22");
        let err = profile_update(&mut form).unwrap_err();
        assert_eq!(
            err.to_string(),
            "This route is not for password updates. Please use /update-my-password."
        );
    }

    #[test]
    fn test_profile_update_validates_email() {
        let mut form = MultipartForm::default();
        form.insert("name", "  Ann ");
        form.insert("email", "not-an-email");
        assert!(matches!(
            profile_update(&mut form),
            Err(AppError::Validation(_))
        ));

        let mut form = MultipartForm::default();
        form.insert("name", "  Ann ");
        let update = profile_update(&mut form).unwrap();
        assert_eq!(update.name.as_deref(), Some("Ann"));
        assert!(update.email.is_none() && update.photo.is_none());
    }
}
