//! Review handlers.
//!
//! Reviews are public to read. Any signed-in user may review a product once;
//! only the author or an admin may edit or delete a review.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;

use shop_core::{ProductId, ReviewId};

use super::{factory, response};
use crate::db::products::Products;
use crate::db::reviews::{
    ReviewRepository, Reviews, new_review_values, product_scope, update_review_values,
};
use crate::db::{ListQuery, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, PathId};
use crate::middleware::RequireAuth;
use crate::models::{NewReview, UpdateReview, User};
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Only the author or an admin may change a review.
async fn authorize(state: &AppState, user: &User, id: ReviewId) -> Result<()> {
    let author = ReviewRepository::new(state.pool())
        .author(id)
        .await?
        .ok_or_else(factory::not_found::<Reviews>)?;

    if author != user.id && !user.is_admin() {
        return Err(AuthError::Forbidden.into());
    }
    Ok(())
}

/// `GET /products/{id}/reviews`
pub async fn list_for_product(
    State(state): State<AppState>,
    PathId(product): PathId<ProductId>,
    query: ListQuery,
) -> Result<Json<Value>> {
    factory::list_records::<Reviews>(state.pool(), &query, &[product_scope(product)]).await
}

/// `POST /products/{id}/reviews`
#[tracing::instrument(skip_all, fields(user_id = %user.id, product_id = %product))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathId(product): PathId<ProductId>,
    ApiJson(input): ApiJson<NewReview>,
) -> Result<(StatusCode, Json<Value>)> {
    let (review, rating) = new_review_values(input)?;
    let review = ReviewRepository::new(state.pool())
        .create(product, user.id, &review, rating)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => factory::not_found::<Products>(),
            RepositoryError::Conflict(_) => {
                AppError::BadRequest("You have already reviewed this product".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!(review_id = %review.id, "Review created");
    Ok((StatusCode::CREATED, response::one("review", review)?))
}

/// `PATCH /reviews/{id}`
#[tracing::instrument(skip_all, fields(user_id = %user.id, review_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathId(id): PathId<ReviewId>,
    ApiJson(input): ApiJson<UpdateReview>,
) -> Result<Json<Value>> {
    authorize(&state, &user, id).await?;
    let (review, rating) = update_review_values(input)?;

    let review = ReviewRepository::new(state.pool())
        .update(id, review.as_deref(), rating)
        .await?
        .ok_or_else(factory::not_found::<Reviews>)?;
    response::one("review", review)
}

/// `DELETE /reviews/{id}`
#[tracing::instrument(skip_all, fields(user_id = %user.id, review_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathId(id): PathId<ReviewId>,
) -> Result<StatusCode> {
    authorize(&state, &user, id).await?;

    if !ReviewRepository::new(state.pool()).delete(id).await? {
        return Err(factory::not_found::<Reviews>());
    }
    tracing::info!("Review deleted");
    Ok(StatusCode::NO_CONTENT)
}
