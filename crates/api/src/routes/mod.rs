//! HTTP route handlers for the shop API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database ping)
//! GET  /images/...                      - Uploaded product and user images
//!
//! # Accounts (/api/v1/users)
//! POST   /signup                        - Create account, sign in
//! POST   /signin                        - Sign in
//! GET    /logout                        - Replace the session cookie
//! POST   /forgot-password               - Email a reset link
//! PATCH  /reset-password/{token}        - Set password from a reset link
//! PATCH  /update-my-password            - Change password (user)
//! GET    /me                            - Current user (user)
//! PATCH  /update-me                     - Name, email, photo (user, multipart)
//! DELETE /delete-me                     - Deactivate account (user)
//! GET    /, /{id}                       - Accounts (admin)
//!
//! # Catalog (/api/v1)
//! GET    /products, /products/{id}      - Public
//! POST   /products                      - Admin, multipart
//! PATCH  /products/{id}                 - Admin, multipart
//! DELETE /products/{id}                 - Admin
//! GET    /products/{id}/reviews         - Public
//! POST   /products/{id}/reviews         - User
//! GET    /categories[/{id}]             - Public; POST/PATCH/DELETE admin
//! GET    /notifications[/{id}]          - Public; POST/PATCH/DELETE admin
//! GET    /reviews[/{id}]                - Public; PATCH/DELETE author or admin
//!
//! # Cart and orders (/api/v1, user)
//! GET    /cart                          - Open cart lines
//! POST   /items                         - Add to cart
//! PATCH  /items/{id}                    - Change quantity
//! DELETE /items/{id}                    - Remove line
//! GET    /orders, /orders/{id}          - Own orders (all for admins)
//! POST   /orders                        - Check out the cart
//! PATCH  /orders/{id}                   - Change status (admin)
//! DELETE /orders/{id}                   - Cancel while new (any for admins)
//! ```

pub mod cart;
pub mod factory;
pub mod orders;
pub mod products;
pub mod response;
pub mod reviews;
pub mod users;

use axum::{
    Router,
    extract::{DefaultBodyLimit, OriginalUri, State},
    http::StatusCode,
    middleware::from_fn,
    routing::{delete, get, patch, post},
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::db::categories::Categories;
use crate::db::notifications::Notifications;
use crate::db::products::Products;
use crate::db::reviews::Reviews;
use crate::error::AppError;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, rate_limit_response_middleware, request_id_middleware,
    security_headers_middleware,
};
use crate::services::uploads::UploadKind;
use crate::state::AppState;

/// Body limit for JSON routes.
pub const JSON_BODY_LIMIT: usize = 10 * 1024;

/// Body limit for routes that take an image upload.
pub const UPLOAD_BODY_LIMIT: usize = 5 * 1024 * 1024;

/// Remove a freshly stored upload after the write it belonged to failed.
async fn discard_upload(state: &AppState, kind: UploadKind, name: Option<&str>) {
    if let Some(name) = name {
        state.uploads().remove(kind, name).await;
    }
}

/// Create the account routes router.
fn user_routes(rate_limit: bool) -> Router<AppState> {
    let mut auth = Router::new()
        .route("/signup", post(users::signup))
        .route("/signin", post(users::signin))
        .route("/forgot-password", post(users::forgot_password))
        .route("/reset-password/{token}", patch(users::reset_password));
    if let Some(limiter) = rate_limit.then(auth_rate_limiter).flatten() {
        auth = auth.layer(limiter);
    }

    Router::new()
        .merge(auth)
        .route("/logout", get(users::logout))
        .route("/update-my-password", patch(users::update_password))
        .route("/me", get(users::me))
        .route(
            "/update-me",
            patch(users::update_me).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/delete-me", delete(users::delete_me))
        .route("/", get(users::list))
        .route("/{id}", get(users::show))
}

/// Create the product routes router.
fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(factory::get_all::<Products>)
                .post(products::create)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/{id}",
            get(factory::get_one::<Products>)
                .patch(products::update)
                .delete(products::delete)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/{id}/reviews",
            get(reviews::list_for_product).post(reviews::create),
        )
}

/// Create the category routes router.
fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(factory::get_all::<Categories>).post(factory::create_one::<Categories>),
        )
        .route(
            "/{id}",
            get(factory::get_one::<Categories>)
                .patch(factory::update_one::<Categories>)
                .delete(factory::delete_one::<Categories>),
        )
}

/// Create the notification routes router.
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(factory::get_all::<Notifications>).post(factory::create_one::<Notifications>),
        )
        .route(
            "/{id}",
            get(factory::get_one::<Notifications>)
                .patch(factory::update_one::<Notifications>)
                .delete(factory::delete_one::<Notifications>),
        )
}

/// Create the review routes router.
fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(factory::get_all::<Reviews>))
        .route(
            "/{id}",
            get(factory::get_one::<Reviews>)
                .patch(reviews::update)
                .delete(reviews::delete),
        )
}

/// Create the cart, cart line and order routes router.
fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::show))
        .route("/items", post(cart::add))
        .route("/items/{id}", patch(cart::update).delete(cart::remove))
        .route("/orders", get(orders::list).post(orders::create))
        .route(
            "/orders/{id}",
            get(orders::show)
                .patch(orders::update)
                .delete(orders::delete),
        )
}

/// Create all `/api/v1` routes.
pub fn api_routes(rate_limit: bool) -> Router<AppState> {
    let mut api = Router::new()
        .nest("/users", user_routes(rate_limit))
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/notifications", notification_routes())
        .nest("/reviews", review_routes())
        .merge(checkout_routes());
    if let Some(limiter) = rate_limit.then(api_rate_limiter).flatten() {
        api = api.layer(limiter);
    }
    api.layer(from_fn(rate_limit_response_middleware))
}

/// Build the full application: routes, static images and middleware.
pub fn app(state: AppState) -> Router {
    let images = ServeDir::new(state.uploads().root());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/v1", api_routes(state.config().rate_limit))
        .nest_service("/images", images)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri.path()))
}
