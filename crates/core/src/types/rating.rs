//! Review ratings and the product rating aggregate.

use serde::{Deserialize, Serialize};

/// Average shown for products without reviews.
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Rating must be between 1 and 5, got {0}")]
pub struct RatingError(pub i64);

/// A single review score, 1 through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct Rating(i32);

impl Rating {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 5;

    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        i32::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(RatingError(value))
    }
}

impl From<Rating> for i32 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Rating {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i32 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i32 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Rating {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i32 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::try_from(i64::from(raw))?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Rating {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i32 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// Round an average to one decimal place (`4.666` becomes `4.7`).
#[must_use]
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Recompute a product's `(ratings_average, ratings_quantity)` from its
/// remaining review scores.
#[must_use]
pub fn aggregate(ratings: &[Rating]) -> (f64, i32) {
    if ratings.is_empty() {
        return (DEFAULT_RATINGS_AVERAGE, 0);
    }
    let sum: i32 = ratings.iter().map(|r| r.0).sum();
    let count = i32::try_from(ratings.len()).unwrap_or(i32::MAX);
    (round_rating(f64::from(sum) / f64::from(count)), count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn ratings(raw: &[i64]) -> Vec<Rating> {
        raw.iter().map(|r| Rating::try_from(*r).unwrap()).collect()
    }

    #[test]
    fn test_bounds() {
        assert!(Rating::try_from(0).is_err());
        assert!(Rating::try_from(6).is_err());
        assert_eq!(Rating::try_from(5).unwrap().get(), 5);
    }

    #[test]
    fn test_round_rating() {
        assert_eq!(round_rating(4.666_666), 4.7);
        assert_eq!(round_rating(4.0), 4.0);
        assert_eq!(round_rating(3.25), 3.3);
    }

    #[test]
    fn test_aggregate_defaults_when_empty() {
        assert_eq!(aggregate(&[]), (DEFAULT_RATINGS_AVERAGE, 0));
    }

    #[test]
    fn test_aggregate_averages() {
        assert_eq!(aggregate(&ratings(&[5, 4, 5])), (4.7, 3));
        assert_eq!(aggregate(&ratings(&[1])), (1.0, 1));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Rating>("7").is_err());
        assert_eq!(serde_json::from_str::<Rating>("3").unwrap().get(), 3);
    }
}
