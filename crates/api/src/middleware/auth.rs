//! Authentication extractors and the session cookie.
//!
//! A request is authenticated by an `Authorization: Bearer <token>` header
//! or, failing that, the `jwt` cookie.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Name of the session cookie.
pub const JWT_COOKIE: &str = "jwt";

/// Value written to the cookie on logout.
const LOGGED_OUT: &str = "loggedout";

fn request_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(JWT_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty() && t != LOGGED_OUT)
}

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = request_token(&parts.headers).ok_or(AuthError::NotLoggedIn)?;
        let user = AuthService::new(state.pool(), state.jwt())
            .authenticate(&token)
            .await?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route denied");
            return Err(AuthError::Forbidden.into());
        }
        Ok(Self(user))
    }
}

/// Whether the request reached the proxy over HTTPS.
fn forwarded_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// The `jwt` cookie carrying a freshly issued token.
#[must_use]
pub fn session_cookie(
    token: String,
    lifetime_days: i64,
    always_secure: bool,
    headers: &HeaderMap,
) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(always_secure || forwarded_https(headers))
        .max_age(time::Duration::days(lifetime_days))
        .build()
}

/// The cookie that replaces the session on logout; it expires in 10 seconds.
#[must_use]
pub fn logout_cookie() -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, LOGGED_OUT))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(10))
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_bearer_token_wins() {
        let map = headers(&[("authorization", "Bearer abc"), ("cookie", "jwt=def")]);
        assert_eq!(request_token(&map).as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_token() {
        let map = headers(&[("cookie", "theme=dark; jwt=def")]);
        assert_eq!(request_token(&map).as_deref(), Some("def"));
    }

    #[test]
    fn test_logged_out_cookie_is_no_token() {
        assert_eq!(request_token(&headers(&[("cookie", "jwt=loggedout")])), None);
        assert_eq!(request_token(&headers(&[("authorization", "Basic xyz")])), None);
        assert_eq!(request_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie("t".into(), 90, false, &HeaderMap::new());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(90)));

        let forwarded = headers(&[("x-forwarded-proto", "https")]);
        assert_eq!(session_cookie("t".into(), 1, false, &forwarded).secure(), Some(true));
        assert_eq!(session_cookie("t".into(), 1, true, &HeaderMap::new()).secure(), Some(true));
    }

    #[test]
    fn test_logout_cookie() {
        let cookie = logout_cookie();
        assert_eq!(cookie.value(), "loggedout");
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(10)));
    }
}
