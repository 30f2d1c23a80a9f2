//! Image uploads stored on the local filesystem.
//!
//! Files land in `<root>/products/` and `<root>/users/` and are served
//! statically under `/images/`.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use shop_core::UserId;

/// Photo every account starts with; never deleted.
pub const DEFAULT_PHOTO: &str = "default.jpg";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Not an image! Please upload only images.")]
    NotAnImage,

    #[error("upload I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Product,
    User,
}

impl UploadKind {
    const fn dir(self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::User => "users",
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::User => "user",
        }
    }
}

/// Raster formats accepted for upload, with the extension they are stored
/// under. Markup formats such as `image/svg+xml` are refused.
const RASTER_TYPES: &[(&str, &str)] = &[
    ("jpeg", "jpeg"),
    ("jpg", "jpeg"),
    ("pjpeg", "jpeg"),
    ("png", "png"),
    ("gif", "gif"),
    ("webp", "webp"),
];

/// File extension for an accepted image content type (`image/png` -> `png`).
fn image_extension(content_type: Option<&str>) -> Result<&'static str, UploadError> {
    let subtype = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .and_then(|ct| ct.strip_prefix("image/"))
        .ok_or(UploadError::NotAnImage)?;

    RASTER_TYPES
        .iter()
        .find(|(accepted, _)| subtype.eq_ignore_ascii_case(accepted))
        .map(|(_, ext)| *ext)
        .ok_or(UploadError::NotAnImage)
}

/// Writes and removes uploaded images.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory served under `/images`.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check an upload's content type before reading its body.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::NotAnImage` for anything but JPEG, PNG, GIF or WebP.
    pub fn validate(content_type: Option<&str>) -> Result<(), UploadError> {
        image_extension(content_type).map(|_| ())
    }

    /// Store an image and return its file name
    /// (`product-<uploader>-<millis>.<ext>`).
    ///
    /// # Errors
    ///
    /// Returns `UploadError::NotAnImage` for non-image content types and
    /// `UploadError::Io` if the file cannot be written.
    pub async fn save(
        &self,
        kind: UploadKind,
        uploader: UserId,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let ext = image_extension(content_type)?;
        let name = format!(
            "{}-{uploader}-{}.{ext}",
            kind.prefix(),
            Utc::now().timestamp_millis()
        );

        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&name), bytes).await?;

        tracing::debug!(file = %name, size = bytes.len(), "Image stored");
        Ok(name)
    }

    /// Delete a stored image. Missing files and the default photo are left
    /// alone.
    pub async fn remove(&self, kind: UploadKind, name: &str) {
        if name == DEFAULT_PHOTO || name.contains(['/', '\\']) || name.starts_with('.') {
            return;
        }
        match tokio::fs::remove_file(self.root.join(kind.dir()).join(name)).await {
            Ok(()) => tracing::debug!(file = %name, "Image removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(file = %name, error = %e, "Failed to remove image"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Some("image/jpeg")).unwrap(), "jpeg");
        assert_eq!(image_extension(Some("image/PNG")).unwrap(), "png");
        assert_eq!(image_extension(Some("image/jpg")).unwrap(), "jpeg");
        assert_eq!(
            image_extension(Some("image/webp; charset=binary")).unwrap(),
            "webp"
        );
        assert!(matches!(
            image_extension(Some("application/pdf")),
            Err(UploadError::NotAnImage)
        ));
        assert!(matches!(image_extension(None), Err(UploadError::NotAnImage)));
        assert!(matches!(
            image_extension(Some("image/../")),
            Err(UploadError::NotAnImage)
        ));
    }

    #[test]
    fn test_markup_images_rejected() {
        for content_type in ["image/svg+xml", "image/SVG+XML", "image/svg", "image/x-icon"] {
            assert!(
                matches!(
                    image_extension(Some(content_type)),
                    Err(UploadError::NotAnImage)
                ),
                "{content_type}"
            );
            assert!(UploadStore::validate(Some(content_type)).is_err());
        }
    }

    #[test]
    fn test_not_an_image_message() {
        assert_eq!(
            UploadError::NotAnImage.to_string(),
            "Not an image! Please upload only images."
        );
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let name = store
            .save(UploadKind::Product, UserId::new(7), Some("image/png"), b"png")
            .await
            .unwrap();
        assert!(name.starts_with("product-7-"));
        assert!(name.ends_with(".png"));

        let path = dir.path().join("products").join(&name);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"png");

        store.remove(UploadKind::Product, &name).await;
        assert!(!path.exists());

        // Removing twice is a no-op.
        store.remove(UploadKind::Product, &name).await;
    }

    #[tokio::test]
    async fn test_default_photo_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let users = dir.path().join("users");
        std::fs::create_dir_all(&users).unwrap();
        std::fs::write(users.join(DEFAULT_PHOTO), b"jpg").unwrap();

        UploadStore::new(dir.path())
            .remove(UploadKind::User, DEFAULT_PHOTO)
            .await;
        assert!(users.join(DEFAULT_PHOTO).exists());
    }
}
