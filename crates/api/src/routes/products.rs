//! Product handlers.
//!
//! Reads go through the generic factory; writes are multipart forms carrying
//! the product image.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde_json::Value;

use shop_core::ProductId;

use super::{discard_upload, factory, response};
use crate::db::products::{ProductRepository, Products};
use crate::db::{ResourceRepository, Writable};
use crate::error::{AppError, Result};
use crate::extract::{MultipartForm, PathId};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, UpdateProduct, User, non_blank};
use crate::services::uploads::UploadKind;
use crate::state::AppState;

/// Form part carrying the product image.
const IMAGE_FIELD: &str = "image";

/// Write the uploaded image, if any, and return its stored name.
async fn save_image(
    state: &AppState,
    admin: &User,
    form: &mut MultipartForm,
) -> Result<Option<String>> {
    let Some(file) = form.file.take() else {
        return Ok(None);
    };
    let name = state
        .uploads()
        .save(
            UploadKind::Product,
            admin.id,
            file.content_type.as_deref(),
            &file.bytes,
        )
        .await?;
    Ok(Some(name))
}

fn new_product(form: &mut MultipartForm, image: Option<String>) -> NewProduct {
    NewProduct {
        name: form.take("name"),
        description: form.take("description"),
        price: form.take("price"),
        category: form.take("category"),
        image,
    }
}

/// Sent but empty `description`/`category` values clear the column.
fn product_update(form: &mut MultipartForm, image: Option<String>) -> UpdateProduct {
    UpdateProduct {
        name: form.take("name"),
        description: form.take("description").map(Some),
        price: form.take("price"),
        category: form.take("category").map(|raw| non_blank(Some(raw))),
        image,
    }
}

/// `POST /products`
#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let mut form = MultipartForm::read(multipart, IMAGE_FIELD).await?;
    let image = save_image(&state, &admin, &mut form).await?;
    let input = new_product(&mut form, image.clone());

    let created = match Products::create_values(input) {
        Ok(values) => ResourceRepository::<Products>::new(state.pool())
            .create(values)
            .await
            .map_err(AppError::from),
        Err(e) => Err(e.into()),
    };

    match created {
        Ok(product) => {
            tracing::info!(product_id = %product.id, "Product created");
            Ok((StatusCode::CREATED, response::one("product", product)?))
        }
        Err(e) => {
            discard_upload(&state, UploadKind::Product, image.as_deref()).await;
            Err(e)
        }
    }
}

/// `PATCH /products/{id}`
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathId(id): PathId<ProductId>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let mut form = MultipartForm::read(multipart, IMAGE_FIELD).await?;
    let old_image = ProductRepository::new(state.pool())
        .image(id)
        .await?
        .ok_or_else(factory::not_found::<Products>)?;

    let image = save_image(&state, &admin, &mut form).await?;
    let input = product_update(&mut form, image.clone());

    let updated = match Products::update_values(input) {
        Ok(values) => ResourceRepository::<Products>::new(state.pool())
            .update(id, values)
            .await
            .map_err(AppError::from)
            .and_then(|product| product.ok_or_else(factory::not_found::<Products>)),
        Err(e) => Err(e.into()),
    };

    match updated {
        Ok(product) => {
            if image.is_some() {
                state.uploads().remove(UploadKind::Product, &old_image).await;
            }
            response::one("product", product)
        }
        Err(e) => {
            discard_upload(&state, UploadKind::Product, image.as_deref()).await;
            Err(e)
        }
    }
}

/// `DELETE /products/{id}`
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathId(id): PathId<ProductId>,
) -> Result<StatusCode> {
    let image = ProductRepository::new(state.pool())
        .delete(id)
        .await?
        .ok_or_else(factory::not_found::<Products>)?;

    state.uploads().remove(UploadKind::Product, &image).await;
    tracing::info!("Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
