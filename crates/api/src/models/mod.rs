//! Domain records returned by the API and the payloads that create them.
//!
//! Records serialize with camelCase keys; those keys are also the names used
//! in list query strings (`?sort=-ratingsAverage`).

pub mod category;
pub mod item;
pub mod notification;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

use std::fmt;

use serde::{Deserialize, Deserializer};

pub use category::{Category, CategoryRef, NewCategory, UpdateCategory};
pub use item::{Item, MAX_QUANTITY, NewItem, ProductSummary, UpdateItem};
pub use notification::{NewNotification, Notification, UpdateNotification};
pub use order::{NewOrder, Order, OrderLine, OrderedProduct, UpdateOrder, UserSummary};
pub use product::{NewProduct, Product, UpdateProduct};
pub use review::{NewReview, Review, ReviewAuthor, UpdateReview};
pub use user::{NewUser, User};

/// One or more broken payload rules, rendered as
/// `Invalid input data. <rule>. <rule>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub Vec<String>);

impl ValidationError {
    #[must_use]
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid input data. {}", self.0.join(". "))
    }
}

impl std::error::Error for ValidationError {}

/// Collects rule violations while a payload is converted.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Trimmed, non-empty text or an error with `message`.
    pub fn required_text(&mut self, value: Option<String>, message: &str) -> Option<String> {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.error(message);
                None
            }
        }
    }

    /// Like [`Self::required_text`], but absence is fine (for updates).
    pub fn optional_text(&mut self, value: Option<String>, message: &str) -> Option<String> {
        value.and_then(|v| self.required_text(Some(v), message))
    }

    /// Unwrap a fallible conversion, recording its error.
    pub fn check<T, E: fmt::Display>(&mut self, result: Result<T, E>) -> Option<T> {
        result.map_err(|e| self.error(e.to_string())).ok()
    }

    /// `Ok(value)` when no rule was broken.
    ///
    /// # Errors
    ///
    /// Returns every collected message.
    pub fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError(self.errors))
        }
    }
}

/// Blank strings become `None`, everything else is trimmed.
#[must_use]
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates.
///
/// # Errors
///
/// Returns the deserializer's error for values of the wrong type.
pub fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = ValidationError(vec!["A product must have a name".into(), "Price must be above or equal to 0".into()]);
        assert_eq!(
            err.to_string(),
            "Invalid input data. A product must have a name. Price must be above or equal to 0"
        );
    }

    #[test]
    fn test_validator_collects() {
        let mut v = Validator::new();
        let name = v.required_text(Some("  Hat ".into()), "name required");
        let title = v.required_text(Some("   ".into()), "title required");
        let missing = v.optional_text(None, "never");
        assert_eq!(name.as_deref(), Some("Hat"));
        assert!(title.is_none() && missing.is_none());
        assert_eq!(v.finish(()).unwrap_err().0, vec!["title required"]);
    }

    #[test]
    fn test_nullable_update_fields() {
        let absent: UpdateCategory = serde_json::from_str(r#"{"name":"Hats"}"#).unwrap();
        assert_eq!(absent.description, None);

        let cleared: UpdateCategory = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let set: UpdateCategory = serde_json::from_str(r#"{"description":"Caps"}"#).unwrap();
        assert_eq!(set.description, Some(Some("Caps".to_string())));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some(" x ".into())).as_deref(), Some("x"));
        assert_eq!(non_blank(Some("  ".into())), None);
    }
}
