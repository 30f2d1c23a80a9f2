//! Shop API library.
//!
//! REST backend for a small shop: catalog, reviews, carts, orders and
//! password accounts with RS256 session tokens. The `shop-api` binary serves
//! [`routes::app`]; the CLI reuses the repositories and password hashing.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
