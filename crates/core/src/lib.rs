//! Shop Core - Shared domain types for the Shop API.
//!
//! This crate provides the types shared by the Shop API components:
//! - `api` - The REST API server
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and validation rules - no I/O, no
//! database access, no HTTP. Database encoding is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, roles, order statuses,
//!   prices and ratings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
