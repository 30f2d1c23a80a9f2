//! Category resource.

use shop_core::CategoryId;

use super::query::{Field, FieldKind};
use super::resource::{Assignment, Resource, SqlValue, Writable};
use crate::models::{Category, NewCategory, UpdateCategory, ValidationError, Validator, non_blank};

const NAME_REQUIRED: &str = "A category must have a name";

pub struct Categories;

impl Resource for Categories {
    type Id = CategoryId;
    type Record = Category;

    const TABLE: &'static str = "categories";
    const SINGULAR: &'static str = "category";
    const PLURAL: &'static str = "categories";
    const SELECT: &'static str = "SELECT c.id, c.name, c.description, c.created_at FROM categories c";
    const ID_COLUMN: &'static str = "c.id";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "c.id", FieldKind::Integer),
        Field::new("name", "c.name", FieldKind::Text),
        Field::new("description", "c.description", FieldKind::Text),
        Field::new("createdAt", "c.created_at", FieldKind::Timestamp),
    ];
}

impl Writable for Categories {
    type Create = NewCategory;
    type Update = UpdateCategory;

    fn create_values(input: NewCategory) -> Result<Vec<Assignment>, ValidationError> {
        let mut v = Validator::new();
        let name = v.required_text(input.name, NAME_REQUIRED);
        v.finish(())?;

        let mut values = vec![("name", SqlValue::Text(name.unwrap_or_default()))];
        if let Some(description) = non_blank(input.description) {
            values.push(("description", SqlValue::Text(description)));
        }
        Ok(values)
    }

    fn update_values(input: UpdateCategory) -> Result<Vec<Assignment>, ValidationError> {
        let mut v = Validator::new();
        let name = v.optional_text(input.name, NAME_REQUIRED);
        v.finish(())?;

        let mut values = Vec::new();
        if let Some(name) = name {
            values.push(("name", SqlValue::Text(name)));
        }
        if let Some(description) = input.description {
            values.push(("description", SqlValue::text_or_null(non_blank(description))));
        }
        Ok(values)
    }
}
