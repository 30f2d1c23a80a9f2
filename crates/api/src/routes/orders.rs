//! Order handlers.
//!
//! Customers see and cancel their own orders; admins see all orders and move
//! them through their statuses.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;

use shop_core::{OrderId, OrderStatus, Price};

use super::{factory, response};
use crate::db::{ListQuery, RepositoryError, Scope};
use crate::db::orders::{OrderDeletion, OrderRepository, Orders, owner_scope};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, PathId};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{NewOrder, UpdateOrder, User, ValidationError, Validator};
use crate::state::AppState;

/// Rows `user` may see: everything for admins, their own orders otherwise.
fn visible_to(user: &User) -> Vec<Scope> {
    if user.is_admin() {
        Vec::new()
    } else {
        vec![owner_scope(user.id)]
    }
}

fn checkout_details(input: NewOrder) -> std::result::Result<(String, String), ValidationError> {
    let mut v = Validator::new();
    let address = v.required_text(input.address, "An order must have an address");
    let phone = v.required_text(input.phone, "An order must have a phone number");
    v.finish(())?;
    address
        .zip(phone)
        .ok_or_else(|| ValidationError::single("An order must have an address"))
}

fn parse_status(input: UpdateOrder) -> std::result::Result<OrderStatus, ValidationError> {
    input
        .status
        .ok_or_else(|| ValidationError::single("Please provide a status"))?
        .parse::<OrderStatus>()
        .map_err(ValidationError::single)
}

/// `GET /orders`
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    query: ListQuery,
) -> Result<Json<Value>> {
    factory::list_records::<Orders>(state.pool(), &query, &visible_to(&user)).await
}

/// `POST /orders`: check out the caller's cart.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(input): ApiJson<NewOrder>,
) -> Result<(StatusCode, Json<Value>)> {
    let (address, phone) = checkout_details(input)?;
    let order = OrderRepository::new(state.pool())
        .checkout(user.id, &address, &phone)
        .await
        .map_err(|e| match e {
            RepositoryError::Invalid(field) if field == "total" => AppError::BadRequest(format!(
                "Order total can not exceed {}. Please split the order.",
                Price::MAX
            )),
            other => other.into(),
        })?
        .ok_or_else(|| AppError::NotFound("Required item in cart to order.".to_string()))?;
    Ok((StatusCode::CREATED, response::one("order", order)?))
}

/// `GET /orders/{id}`: other users' orders look absent.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathId(id): PathId<OrderId>,
) -> Result<Json<Value>> {
    let order = factory::one_record::<Orders>(state.pool(), id, &visible_to(&user)).await?;
    response::one("order", order)
}

/// `PATCH /orders/{id}` (admin): change the status.
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathId(id): PathId<OrderId>,
    ApiJson(input): ApiJson<UpdateOrder>,
) -> Result<Json<Value>> {
    let status = parse_status(input)?;
    let order = OrderRepository::new(state.pool())
        .set_status(id, status)
        .await?
        .ok_or_else(factory::not_found::<Orders>)?;

    tracing::info!(%status, "Order status changed");
    response::one("order", order)
}

/// `DELETE /orders/{id}`
#[tracing::instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathId(id): PathId<OrderId>,
) -> Result<StatusCode> {
    let owner = (!user.is_admin()).then_some(user.id);
    match OrderRepository::new(state.pool()).delete(id, owner).await? {
        OrderDeletion::Deleted => {
            tracing::info!("Order deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        OrderDeletion::NotFound => Err(factory::not_found::<Orders>()),
        OrderDeletion::NotNew(status) => Err(AppError::BadRequest(format!(
            "Order is already {status} and can no longer be canceled"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_details_required() {
        let err = checkout_details(NewOrder::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input data. An order must have an address. An order must have a phone number"
        );

        let (address, phone) = checkout_details(NewOrder {
            address: Some(" 1 Main St ".into()),
            phone: Some("555-0100".into()),
        })
        .unwrap();
        assert_eq!(address, "1 Main St");
        assert_eq!(phone, "555-0100");
    }

    #[test]
    fn test_parse_status() {
        let shipped = UpdateOrder {
            status: Some("shipping".into()),
        };
        assert_eq!(parse_status(shipped).unwrap(), OrderStatus::Shipping);

        let bogus = UpdateOrder {
            status: Some("lost".into()),
        };
        assert!(
            parse_status(bogus)
                .unwrap_err()
                .to_string()
                .starts_with("Invalid input data. Order status is either")
        );
    }
}
