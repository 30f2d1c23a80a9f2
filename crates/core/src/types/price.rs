//! Non-negative monetary amounts using decimal arithmetic.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("A product must have a price")]
    Missing,
    #[error("Price must be a number, got {0}")]
    NotANumber(String),
    #[error("Price must be above or equal to 0")]
    Negative,
    #[error("Price must be below or equal to {}", Price::MAX)]
    TooLarge,
}

/// A price in the store currency, always within `0..=Price::MAX` with two
/// decimal places.
///
/// Serialized as a JSON number (`19.99`) to match what clients send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest amount a `NUMERIC(12, 2)` column holds: `9999999999.99`.
    pub const MAX: Self = Self(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2));

    /// Validate and round an amount to cents (half away from zero).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero and
    /// [`PriceError::TooLarge`] for amounts above [`Price::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if amount > Self::MAX.0 {
            return Err(PriceError::TooLarge);
        }
        Ok(Self(amount))
    }

    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units, or `None` past [`Price::MAX`].
    #[must_use]
    pub fn line_total(self, quantity: i32) -> Option<Self> {
        self.0
            .checked_mul(Decimal::from(quantity.max(0)))
            .filter(|amount| *amount <= Self::MAX.0)
            .map(Self)
    }

    /// Sum of two prices, or `None` past [`Price::MAX`].
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0
            .checked_add(other.0)
            .filter(|amount| *amount <= Self::MAX.0)
            .map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::str::FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PriceError::Missing);
        }
        let amount = s
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(s))
            .map_err(|_| PriceError::NotANumber(s.to_owned()))?;
        Self::new(amount)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = rust_decimal::serde::float::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_to_cents() {
        let price: Price = "19.995".parse().unwrap();
        assert_eq!(price.to_string(), "20.00");
        assert_eq!("7".parse::<Price>().unwrap().to_string(), "7.00");
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert_eq!("-0.01".parse::<Price>(), Err(PriceError::Negative));
        assert_eq!("".parse::<Price>(), Err(PriceError::Missing));
        assert!(matches!(
            "cheap".parse::<Price>(),
            Err(PriceError::NotANumber(_))
        ));
    }

    #[test]
    fn test_zero_is_allowed() {
        assert_eq!("0".parse::<Price>().unwrap(), Price::ZERO);
    }

    #[test]
    fn test_order_total() {
        let lines = [("12.50", 2), ("3.99", 3)];
        let total = lines.iter().try_fold(Price::ZERO, |total, (p, q)| {
            total.checked_add(p.parse::<Price>().unwrap().line_total(*q)?)
        });
        assert_eq!(total.unwrap().to_string(), "36.97");
    }

    #[test]
    fn test_upper_bound() {
        assert_eq!(Price::MAX.to_string(), "9999999999.99");
        assert_eq!("9999999999.99".parse::<Price>().unwrap(), Price::MAX);
        assert_eq!("100000000000".parse::<Price>(), Err(PriceError::TooLarge));
        assert_eq!(
            "9999999999.995".parse::<Price>(),
            Err(PriceError::TooLarge)
        );
        assert!(serde_json::from_str::<Price>("1e12").is_err());

        assert_eq!(Price::MAX.line_total(1), Some(Price::MAX));
        assert_eq!(Price::MAX.line_total(2), None);
        assert_eq!(Price::MAX.checked_add("0.01".parse().unwrap()), None);
    }

    #[test]
    fn test_json_number() {
        let price: Price = serde_json::from_str("149.9").unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "149.9");
        assert!(serde_json::from_str::<Price>("-1").is_err());
    }
}
