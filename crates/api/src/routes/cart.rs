//! Cart and cart line handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;

use shop_core::ItemId;

use super::{factory, response};
use crate::db::items::{CartLine, ItemRepository, Items, cart_scope};
use crate::db::products::Products;
use crate::db::{ListQuery, RepositoryError, ResourceRepository};
use crate::error::Result;
use crate::extract::{ApiJson, PathId};
use crate::middleware::RequireAuth;
use crate::models::{MAX_QUANTITY, NewItem, UpdateItem, ValidationError};
use crate::state::AppState;

const QUANTITY_RULE: &str = "Quantity must be at least 1";

fn too_many() -> ValidationError {
    ValidationError::single(format!("Quantity must be at most {MAX_QUANTITY}"))
}

fn quantity(raw: Option<i32>, default: Option<i32>) -> std::result::Result<i32, ValidationError> {
    match raw.or(default) {
        Some(q) if q > MAX_QUANTITY => Err(too_many()),
        Some(q) if q >= 1 => Ok(q),
        Some(_) => Err(ValidationError::single(QUANTITY_RULE)),
        None => Err(ValidationError::single("Please provide a quantity")),
    }
}

/// `GET /cart`: the caller's open cart lines.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    query: ListQuery,
) -> Result<Json<Value>> {
    let lines = ResourceRepository::<Items>::new(state.pool())
        .list(&query, &cart_scope(user.id))
        .await?;
    response::many("cart", lines, &query)
}

/// `POST /items`: add a product to the cart, merging with an existing line
/// for the same product and option.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(input): ApiJson<NewItem>,
) -> Result<(StatusCode, Json<Value>)> {
    let product = input
        .product
        .ok_or_else(|| ValidationError::single("An item must belong to a product"))?;
    let quantity = quantity(input.quantity, Some(1))?;

    let line = ItemRepository::new(state.pool())
        .add_to_cart(user.id, product, quantity, input.option)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => factory::not_found::<Products>(),
            RepositoryError::Invalid(field) if field == "quantity" => too_many().into(),
            other => other.into(),
        })?;

    let (status, item) = match line {
        CartLine::Merged(item) => (StatusCode::OK, item),
        CartLine::Created(item) => (StatusCode::CREATED, item),
    };
    tracing::info!(item_id = %item.id, quantity = item.quantity, "Cart updated");
    Ok((status, response::one("item", item)?))
}

/// `PATCH /items/{id}`: change a cart line's quantity.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathId(id): PathId<ItemId>,
    ApiJson(input): ApiJson<UpdateItem>,
) -> Result<Json<Value>> {
    let quantity = quantity(input.quantity, None)?;
    let item = ItemRepository::new(state.pool())
        .set_quantity(user.id, id, quantity)
        .await?
        .ok_or_else(factory::not_found::<Items>)?;
    response::one("item", item)
}

/// `DELETE /items/{id}`
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathId(id): PathId<ItemId>,
) -> Result<StatusCode> {
    if !ItemRepository::new(state.pool()).remove(user.id, id).await? {
        return Err(factory::not_found::<Items>());
    }
    Ok(StatusCode::NO_CONTENT)
}
