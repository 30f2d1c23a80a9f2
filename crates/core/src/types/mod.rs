//! Core types for the Shop API.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod rating;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use rating::{DEFAULT_RATINGS_AVERAGE, Rating, RatingError, aggregate as aggregate_ratings, round_rating};
pub use status::*;
