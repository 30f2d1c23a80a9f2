//! End-to-end tests for the Shop API.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate the database and start the server
//! cargo run -p shop-cli -- migrate
//! SHOP_RATE_LIMIT=false cargo run -p shop-api
//!
//! # Run the ignored end-to-end tests
//! cargo test -p shop-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `SHOP_TEST_BASE_URL` - Server under test (default `http://127.0.0.1:4000`)
//! - `SHOP_TEST_ADMIN_EMAIL`, `SHOP_TEST_ADMIN_PASSWORD` - An admin account
//!   (create one with `shop-cli admin create`); admin flows are skipped
//!   without them
//! - `SHOP_DATABASE_URL` (or `DATABASE_URL`) - The server's database, for
//!   flows that need fixtures or row locks; skipped without it

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

/// Password used for every account the tests sign up.
pub const TEST_PASSWORD: &str = "test-pass-1234";

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("SHOP_TEST_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:4000".to_string())
}

/// Absolute URL for an `/api/v1` path.
#[must_use]
pub fn api(path: &str) -> String {
    format!("{}/api/v1{path}", base_url())
}

/// A client that keeps the session cookie.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Read a response as JSON (`Null` for empty bodies).
pub async fn json_body(resp: Response) -> Value {
    let text = resp.text().await.expect("Failed to read response");
    serde_json::from_str(&text).unwrap_or(Value::Null)
}

/// Pool on the server's database, if configured.
pub async fn db() -> Option<PgPool> {
    let url = ["SHOP_DATABASE_URL", "DATABASE_URL"]
        .into_iter()
        .find_map(|name| std::env::var(name).ok())?;
    Some(
        PgPool::connect(&url)
            .await
            .expect("Failed to connect to database"),
    )
}

/// Store a password reset token for `user` that expires `expires_in_secs`
/// from now (negative for an already expired token).
pub async fn set_reset_token(pool: &PgPool, user: i64, token: &str, expires_in_secs: i32) {
    sqlx::query(
        "UPDATE users SET password_reset_token = $1, \
         password_reset_expires = now() + $2 * interval '1 second' WHERE id = $3",
    )
    .bind(hex::encode(Sha256::digest(token.as_bytes())))
    .bind(expires_in_secs)
    .bind(i32::try_from(user).expect("user id fits i32"))
    .execute(pool)
    .await
    .expect("Failed to store reset token");
}

/// A 1x1 transparent PNG.
pub const PIXEL: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Create a product with a unique name as `admin` and return its id.
pub async fn create_product(admin: &TestUser, price: &str) -> i64 {
    let image = Part::bytes(PIXEL.to_vec())
        .file_name("pixel.png")
        .mime_str("image/png")
        .expect("Invalid mime type");
    let form = Form::new()
        .text("name", format!("Product {}", Uuid::new_v4().simple()))
        .text("price", price.to_string())
        .part("image", image);

    let resp = admin
        .request(Method::POST, "/products")
        .multipart(form)
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await["data"]["product"]["id"]
        .as_i64()
        .expect("product id")
}

/// A signed-in account and its bearer token.
pub struct TestUser {
    pub client: Client,
    pub email: String,
    pub token: String,
    pub id: i64,
}

impl TestUser {
    /// Sign up a fresh account with a unique email.
    pub async fn signup() -> Self {
        let client = client();
        let email = format!("test-{}@example.com", Uuid::new_v4().simple());
        let resp = client
            .post(api("/users/signup"))
            .json(&json!({
                "name": "Test User",
                "email": email,
                "password": TEST_PASSWORD,
                "confirmPassword": TEST_PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to sign up");
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body = json_body(resp).await;
        Self {
            client,
            email,
            token: body["token"].as_str().expect("token").to_string(),
            id: body["data"]["user"]["id"].as_i64().expect("user id"),
        }
    }

    /// Sign in with the admin account from the environment, if configured.
    pub async fn admin() -> Option<Self> {
        let email = std::env::var("SHOP_TEST_ADMIN_EMAIL").ok()?;
        let password = std::env::var("SHOP_TEST_ADMIN_PASSWORD").ok()?;

        let client = client();
        let resp = client
            .post(api("/users/signin"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to sign in");
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        Some(Self {
            client,
            email,
            token: body["token"].as_str().expect("token").to_string(),
            id: body["data"]["user"]["id"].as_i64().expect("user id"),
        })
    }

    /// A request carrying the bearer token.
    pub fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, api(path))
            .bearer_auth(&self.token)
    }

    /// Add a product to the cart and return the response status and line.
    pub async fn add_to_cart(&self, product: i64, quantity: i64, option: Option<&str>) -> (StatusCode, Value) {
        let resp = self
            .request(Method::POST, "/items")
            .json(&json!({ "product": product, "quantity": quantity, "option": option }))
            .send()
            .await
            .expect("Failed to add item");
        let status = resp.status();
        (status, json_body(resp).await["data"]["item"].clone())
    }

    /// Check the cart out and return the response status and order.
    pub async fn checkout(&self) -> (StatusCode, Value) {
        let resp = self
            .request(Method::POST, "/orders")
            .json(&json!({ "address": "1 Main St", "phone": "555-0100" }))
            .send()
            .await
            .expect("Failed to create order");
        let status = resp.status();
        (status, json_body(resp).await["data"]["order"].clone())
    }

    /// The lines currently in the cart.
    pub async fn cart(&self) -> Vec<Value> {
        let resp = self
            .request(Method::GET, "/cart")
            .send()
            .await
            .expect("Failed to get cart");
        assert_eq!(resp.status(), StatusCode::OK);
        json_body(resp).await["data"]["cart"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }
}
