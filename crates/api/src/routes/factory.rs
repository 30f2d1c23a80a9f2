//! Generic CRUD handlers shared by every [`Resource`].
//!
//! Reads are public; writes require an admin. Routers mount them with the
//! resource as a type parameter:
//!
//! ```rust,ignore
//! Router::new().route(
//!     "/",
//!     get(factory::get_all::<Categories>).post(factory::create_one::<Categories>),
//! )
//! ```

use std::str::FromStr;

use axum::{Json, extract::State, http::StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::PgPool;

use shop_core::InvalidId;

use super::response;
use crate::db::{ListQuery, Resource, ResourceRepository, Scope, Writable};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, PathId};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// `404 No <singular> found with that ID`
pub(crate) fn not_found<R: Resource>() -> AppError {
    AppError::NotFound(format!("No {} found with that ID", R::SINGULAR))
}

/// Run a list query and wrap the records under the resource's plural key.
pub(crate) async fn list_records<R: Resource>(
    pool: &PgPool,
    query: &ListQuery,
    scopes: &[Scope],
) -> Result<Json<Value>> {
    let records = ResourceRepository::<R>::new(pool).list(query, scopes).await?;
    response::many(R::PLURAL, records, query)
}

/// Fetch one visible record or fail with 404.
pub(crate) async fn one_record<R: Resource>(
    pool: &PgPool,
    id: R::Id,
    scopes: &[Scope],
) -> Result<R::Record> {
    ResourceRepository::<R>::new(pool)
        .get(id, scopes)
        .await?
        .ok_or_else(not_found::<R>)
}

/// `GET /` for a resource.
pub async fn get_all<R: Resource>(
    State(state): State<AppState>,
    query: ListQuery,
) -> Result<Json<Value>> {
    list_records::<R>(state.pool(), &query, &[]).await
}

/// `GET /{id}` for a resource.
pub async fn get_one<R>(
    State(state): State<AppState>,
    PathId(id): PathId<R::Id>,
) -> Result<Json<Value>>
where
    R: Resource,
    R::Id: FromStr<Err = InvalidId>,
{
    let record = one_record::<R>(state.pool(), id, &[]).await?;
    response::one(R::SINGULAR, record)
}

/// `POST /` for a resource.
#[tracing::instrument(skip_all, fields(resource = R::SINGULAR))]
pub async fn create_one<R>(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(input): ApiJson<R::Create>,
) -> Result<(StatusCode, Json<Value>)>
where
    R: Writable,
    R::Create: DeserializeOwned,
{
    let values = R::create_values(input)?;
    let record = ResourceRepository::<R>::new(state.pool())
        .create(values)
        .await?;

    tracing::info!(admin_id = %admin.id, "Record created");
    Ok((StatusCode::CREATED, response::one(R::SINGULAR, record)?))
}

/// `PATCH /{id}` for a resource.
#[tracing::instrument(skip_all, fields(resource = R::SINGULAR))]
pub async fn update_one<R>(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    PathId(id): PathId<R::Id>,
    ApiJson(input): ApiJson<R::Update>,
) -> Result<Json<Value>>
where
    R: Writable,
    R::Id: FromStr<Err = InvalidId>,
    R::Update: DeserializeOwned,
{
    let values = R::update_values(input)?;
    let record = ResourceRepository::<R>::new(state.pool())
        .update(id, values)
        .await?
        .ok_or_else(not_found::<R>)?;
    response::one(R::SINGULAR, record)
}

/// `DELETE /{id}` for a resource.
#[tracing::instrument(skip_all, fields(resource = R::SINGULAR))]
pub async fn delete_one<R>(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathId(id): PathId<R::Id>,
) -> Result<StatusCode>
where
    R: Resource,
    R::Id: FromStr<Err = InvalidId>,
{
    if !ResourceRepository::<R>::new(state.pool()).delete(id).await? {
        return Err(not_found::<R>());
    }

    tracing::info!(admin_id = %admin.id, id = Into::<i32>::into(id), "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}
