//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Signup, signin, token verification, password changes and resets
//! - `email` - Email sending (password reset links)
//! - `token` - RS256 session token signing and verification
//! - `uploads` - Product and profile images on local disk

pub mod auth;
pub mod email;
pub mod token;
pub mod uploads;
