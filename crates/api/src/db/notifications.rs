//! Notification resource.

use shop_core::NotificationId;

use super::query::{Field, FieldKind};
use super::resource::{Assignment, Resource, SqlValue, Writable};
use crate::models::{
    NewNotification, Notification, UpdateNotification, ValidationError, Validator, non_blank,
};

const TITLE_REQUIRED: &str = "A notification must have a title";

pub struct Notifications;

impl Resource for Notifications {
    type Id = NotificationId;
    type Record = Notification;

    const TABLE: &'static str = "notifications";
    const SINGULAR: &'static str = "notification";
    const PLURAL: &'static str = "notifications";
    const SELECT: &'static str =
        "SELECT n.id, n.title, n.content, n.created_at FROM notifications n";
    const ID_COLUMN: &'static str = "n.id";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "n.id", FieldKind::Integer),
        Field::new("title", "n.title", FieldKind::Text),
        Field::new("content", "n.content", FieldKind::Text),
        Field::new("createdAt", "n.created_at", FieldKind::Timestamp),
    ];
}

impl Writable for Notifications {
    type Create = NewNotification;
    type Update = UpdateNotification;

    fn create_values(input: NewNotification) -> Result<Vec<Assignment>, ValidationError> {
        let mut v = Validator::new();
        let title = v.required_text(input.title, TITLE_REQUIRED);
        v.finish(())?;

        Ok(vec![
            ("title", SqlValue::Text(title.unwrap_or_default())),
            ("content", SqlValue::text_or_null(non_blank(input.content))),
        ])
    }

    fn update_values(input: UpdateNotification) -> Result<Vec<Assignment>, ValidationError> {
        let mut v = Validator::new();
        let title = v.optional_text(input.title, TITLE_REQUIRED);
        v.finish(())?;

        let mut values = Vec::new();
        if let Some(title) = title {
            values.push(("title", SqlValue::Text(title)));
        }
        if let Some(content) = input.content {
            values.push(("content", SqlValue::text_or_null(non_blank(content))));
        }
        Ok(values)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_values() {
        let values = Notifications::create_values(NewNotification {
            title: Some("Sale".into()),
            content: None,
        })
        .unwrap();
        assert_eq!(
            values,
            vec![
                ("title", SqlValue::Text("Sale".into())),
                ("content", SqlValue::Null),
            ]
        );
        assert!(Notifications::create_values(NewNotification::default()).is_err());
    }
}
