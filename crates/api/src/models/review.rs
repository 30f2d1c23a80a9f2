//! Product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;

use shop_core::{ProductId, Rating, ReviewId, UserId};

/// Review author as embedded in a review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewAuthor {
    pub id: UserId,
    pub name: String,
    pub photo: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub review: String,
    pub rating: Rating,
    pub product: ProductId,
    /// `None` once the author deactivated their account.
    pub user: Option<ReviewAuthor>,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for Review {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let user_id: UserId = row.try_get("user_id")?;
        let user_name: Option<String> = row.try_get("user_name")?;
        let user_photo: Option<String> = row.try_get("user_photo")?;

        Ok(Self {
            id: row.try_get("id")?,
            review: row.try_get("review")?,
            rating: row.try_get("rating")?,
            product: row.try_get("product_id")?,
            user: user_name
                .zip(user_photo)
                .map(|(name, photo)| ReviewAuthor {
                    id: user_id,
                    name,
                    photo,
                }),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReview {
    pub review: Option<String>,
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReview {
    pub review: Option<String>,
    pub rating: Option<i64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn review(user: Option<ReviewAuthor>) -> Review {
        Review {
            id: ReviewId::from(3_i32),
            review: "Solid".into(),
            rating: Rating::try_from(4_i64).unwrap(),
            product: ProductId::from(9_i32),
            user,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_review_json() {
        let json = serde_json::to_value(review(Some(ReviewAuthor {
            id: UserId::from(5_i32),
            name: "Ada".into(),
            photo: "default.jpg".into(),
        })))
        .unwrap();
        assert_eq!(json["user"]["name"], "Ada");
        assert_eq!(json["product"], 9);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_inactive_author_is_hidden() {
        let json = serde_json::to_value(review(None)).unwrap();
        assert!(json["user"].is_null());
        assert_eq!(json["rating"], 4);
    }
}
