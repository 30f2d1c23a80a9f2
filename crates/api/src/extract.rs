//! Request extractors that reject with `AppError`.

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, multipart::MultipartError},
    http::{StatusCode, request::Parts},
};

use shop_core::InvalidId;

use crate::db::ListQuery;
use crate::error::AppError;
use crate::services::uploads::UploadStore;

/// JSON body extractor whose rejections render as API errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// A typed entity id from the `{id}` path segment.
///
/// Non-numeric and non-positive ids are rejected with `400 Invalid id: <raw>`.
#[derive(Debug, Clone, Copy)]
pub struct PathId<T>(pub T);

impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: FromStr<Err = InvalidId> + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self(raw.parse()?))
    }
}

impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state).await?;
        Ok(Self::from_pairs(pairs))
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// An image file taken from a multipart form.
#[derive(Debug)]
pub struct UploadedFile {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Text fields plus at most one image file of a multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl MultipartForm {
    /// Read every part; the part named `file_field` must be an image.
    ///
    /// Empty file parts (a form submitted without choosing a file) are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upload` for non-image files and
    /// `AppError::BadRequest` for malformed multipart bodies.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == file_field {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(multipart_error)?;
                if bytes.is_empty() {
                    continue;
                }
                UploadStore::validate(content_type.as_deref())?;
                form.file = Some(UploadedFile {
                    content_type,
                    bytes,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(multipart_error)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Take a text field.
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Whether a text field was sent.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, name: &str, value: &str) {
        self.fields.insert(name.to_string(), value.to_string());
    }
}
