//! Product reviews and the rating aggregate they feed.

use sqlx::{PgConnection, PgPool};

use shop_core::{ProductId, Rating, ReviewId, UserId, aggregate_ratings};

use super::RepositoryError;
use super::products::ProductRepository;
use super::query::{Field, FieldKind};
use super::resource::{Resource, ResourceRepository, Scope, SqlValue};
use crate::models::{NewReview, Review, UpdateReview, ValidationError, Validator};

const REVIEW_REQUIRED: &str = "Review can not be empty!";
const RATING_REQUIRED: &str = "A review must have a rating";

pub struct Reviews;

impl Resource for Reviews {
    type Id = ReviewId;
    type Record = Review;

    const TABLE: &'static str = "reviews";
    const SINGULAR: &'static str = "review";
    const PLURAL: &'static str = "reviews";
    const SELECT: &'static str = "SELECT r.id, r.review, r.rating, r.product_id, r.user_id, \
         u.name AS user_name, u.photo AS user_photo, r.created_at \
         FROM reviews r LEFT JOIN users u ON u.id = r.user_id AND u.active";
    const ID_COLUMN: &'static str = "r.id";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "r.id", FieldKind::Integer),
        Field::new("review", "r.review", FieldKind::Text),
        Field::new("rating", "r.rating", FieldKind::Integer),
        Field::new("product", "r.product_id", FieldKind::Integer),
        Field::new("user", "r.user_id", FieldKind::Integer),
        Field::new("createdAt", "r.created_at", FieldKind::Timestamp),
    ];
}

/// Restrict review queries to one product.
#[must_use]
pub fn product_scope(product: ProductId) -> Scope {
    Scope::Eq("r.product_id", SqlValue::Int(product.as_i32()))
}

fn rating(v: &mut Validator, raw: i64) -> Option<Rating> {
    v.check(Rating::try_from(raw))
}

/// Validated review text and rating.
///
/// # Errors
///
/// Returns `ValidationError` for blank text or a missing or out of range rating.
pub fn new_review_values(input: NewReview) -> Result<(String, Rating), ValidationError> {
    let mut v = Validator::new();
    let review = v.required_text(input.review, REVIEW_REQUIRED);
    let score = match input.rating {
        Some(raw) => rating(&mut v, raw),
        None => {
            v.error(RATING_REQUIRED);
            None
        }
    };
    let values = review.zip(score);
    v.finish(())?;
    values.ok_or_else(|| ValidationError::single(RATING_REQUIRED))
}

/// Validated partial review edit.
///
/// # Errors
///
/// Returns `ValidationError` for blank text or an out of range rating.
pub fn update_review_values(
    input: UpdateReview,
) -> Result<(Option<String>, Option<Rating>), ValidationError> {
    let mut v = Validator::new();
    let review = v.optional_text(input.review, REVIEW_REQUIRED);
    let score = input.rating.and_then(|raw| rating(&mut v, raw));
    v.finish((review, score))
}

/// Repository for review writes. Every write recomputes the product's
/// `ratings_average` and `ratings_quantity` in the same transaction.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: i32) -> Result<Review, RepositoryError> {
        ResourceRepository::<Reviews>::new(self.pool)
            .get(ReviewId::new(id), &[])
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("review {id} vanished after write")))
    }

    /// Author of a review, for ownership checks.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn author(&self, id: ReviewId) -> Result<Option<UserId>, RepositoryError> {
        let author = sqlx::query_scalar::<_, UserId>("SELECT user_id FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(author)
    }

    /// Post a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist,
    /// `RepositoryError::Conflict` if the user already reviewed it and
    /// `RepositoryError::Database` for other failures.
    pub async fn create(
        &self,
        product: ProductId,
        user: UserId,
        review: &str,
        rating: Rating,
    ) -> Result<Review, RepositoryError> {
        if !ProductRepository::new(self.pool).exists(product).await? {
            return Err(RepositoryError::NotFound);
        }

        let mut tx = self.pool.begin().await?;
        let id = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO reviews (review, rating, product_id, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(review)
        .bind(rating)
        .bind(product)
        .bind(user)
        .fetch_one(&mut *tx)
        .await?;
        refresh_ratings(&mut tx, product).await?;
        tx.commit().await?;

        self.fetch(id).await
    }

    /// Edit a review's text and/or rating.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn update(
        &self,
        id: ReviewId,
        review: Option<&str>,
        rating: Option<Rating>,
    ) -> Result<Option<Review>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let product = sqlx::query_scalar::<_, ProductId>(
            r"
            UPDATE reviews
            SET review = COALESCE($1, review), rating = COALESCE($2, rating)
            WHERE id = $3
            RETURNING product_id
            ",
        )
        .bind(review)
        .bind(rating)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(product) = product else {
            return Ok(None);
        };
        refresh_ratings(&mut tx, product).await?;
        tx.commit().await?;

        self.fetch(id.as_i32()).await.map(Some)
    }

    /// Delete a review. Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn delete(&self, id: ReviewId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let product = sqlx::query_scalar::<_, ProductId>(
            "DELETE FROM reviews WHERE id = $1 RETURNING product_id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(product) = product else {
            return Ok(false);
        };
        refresh_ratings(&mut tx, product).await?;
        tx.commit().await?;
        Ok(true)
    }
}

async fn refresh_ratings(conn: &mut PgConnection, product: ProductId) -> Result<(), RepositoryError> {
    let ratings = sqlx::query_scalar::<_, Rating>("SELECT rating FROM reviews WHERE product_id = $1")
        .bind(product)
        .fetch_all(&mut *conn)
        .await?;
    let (average, quantity) = aggregate_ratings(&ratings);

    sqlx::query("UPDATE products SET ratings_average = $1, ratings_quantity = $2 WHERE id = $3")
        .bind(average)
        .bind(quantity)
        .bind(product)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(product_id = %product, average, quantity, "Product ratings refreshed");
    Ok(())
}
