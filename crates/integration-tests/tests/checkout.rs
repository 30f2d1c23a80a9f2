//! Cart, checkout and review flows.

#![allow(clippy::print_stderr, clippy::cast_possible_truncation, clippy::float_cmp)]

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

use shop_integration_tests::{TestUser, create_product, db, json_body};

/// Sum of `price * quantity` over an order's lines, in cents.
fn lines_total_cents(order: &Value) -> i64 {
    order["items"]
        .as_array()
        .expect("order items")
        .iter()
        .map(|line| {
            let price = line["product"]["price"].as_f64().expect("price");
            (price * 100.0).round() as i64 * line["quantity"].as_i64().expect("quantity")
        })
        .sum()
}

fn cents(value: &Value) -> i64 {
    (value.as_f64().expect("amount") * 100.0).round() as i64
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_empty_cart_cannot_check_out() {
    let user = TestUser::signup().await;

    let resp = user
        .request(Method::POST, "/orders")
        .json(&json!({ "address": "1 Main St", "phone": "555-0100" }))
        .send()
        .await
        .expect("Failed to create order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["message"], "Required item in cart to order.");
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_add_unknown_product() {
    let user = TestUser::signup().await;

    let resp = user
        .request(Method::POST, "/items")
        .json(&json!({ "product": 999_999_999, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = user
        .request(Method::POST, "/items")
        .json(&json!({ "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_options_are_separate_lines() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "9.99").await;
    let user = TestUser::signup().await;

    let (status, small) = user.add_to_cart(product, 1, Some("S")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, large) = user.add_to_cart(product, 1, Some("L")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(small["id"], large["id"]);

    // Same option merges
    let (status, merged) = user.add_to_cart(product, 2, Some("S")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(merged["id"], small["id"]);
    assert_eq!(merged["quantity"], 3);

    let cart = user.cart().await;
    assert_eq!(cart.len(), 2);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_quantity_limit() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "1").await;
    let user = TestUser::signup().await;

    let (status, _) = user.add_to_cart(product, 10_001, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = user.add_to_cart(product, 10_000, None).await;
    assert_eq!(status, StatusCode::CREATED);

    // Merging past the limit is rejected and leaves the line alone
    let (status, _) = user.add_to_cart(product, 1, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let cart = user.cart().await;
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0]["quantity"], 10_000);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_cart_lines_are_private_and_ordered_lines_frozen() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "4").await;
    let user = TestUser::signup().await;
    let (_, line) = user.add_to_cart(product, 1, None).await;
    let path = format!("/items/{}", line["id"].as_i64().expect("item id"));

    // Another customer's line does not exist for them
    let stranger = TestUser::signup().await;
    let resp = stranger
        .request(Method::PATCH, &path)
        .json(&json!({ "quantity": 5 }))
        .send()
        .await
        .expect("Failed to update item");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = stranger
        .request(Method::DELETE, &path)
        .send()
        .await
        .expect("Failed to delete item");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = user
        .request(Method::PATCH, &path)
        .json(&json!({ "quantity": 2 }))
        .send()
        .await
        .expect("Failed to update item");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["data"]["item"]["quantity"], 2);

    // Once ordered the line is no longer in the cart
    let (status, order) = user.checkout().await;
    assert_eq!(status, StatusCode::CREATED);

    let resp = user
        .request(Method::PATCH, &path)
        .json(&json!({ "quantity": 7 }))
        .send()
        .await
        .expect("Failed to update item");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = user
        .request(Method::DELETE, &path)
        .send()
        .await
        .expect("Failed to delete item");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = user
        .request(Method::GET, &format!("/orders/{}", order["id"]))
        .send()
        .await
        .expect("Failed to get order");
    let order = json_body(resp).await["data"]["order"].clone();
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(cents(&order["total"]), 800);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_cart_to_order() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "12.50").await;
    let user = TestUser::signup().await;

    // Adding the same product twice merges the line
    let resp = user
        .request(Method::POST, "/items")
        .json(&json!({ "product": product, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = user
        .request(Method::POST, "/items")
        .json(&json!({ "product": product, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["data"]["item"]["quantity"], 3);

    let resp = user
        .request(Method::POST, "/orders")
        .json(&json!({ "address": "1 Main St", "phone": "555-0100" }))
        .send()
        .await
        .expect("Failed to create order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = json_body(resp).await["data"]["order"].clone();
    assert_eq!(order["status"], "new");
    assert_eq!(order["total"].as_f64(), Some(37.5));
    let order_id = order["id"].as_i64().expect("order id");

    // The cart is empty once ordered
    let resp = user
        .request(Method::GET, "/cart")
        .send()
        .await
        .expect("Failed to get cart");
    assert_eq!(json_body(resp).await["results"], 0);

    // Other customers cannot see the order
    let stranger = TestUser::signup().await;
    let resp = stranger
        .request(Method::GET, &format!("/orders/{order_id}"))
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Shipped orders can no longer be canceled
    let resp = admin
        .request(Method::PATCH, &format!("/orders/{order_id}"))
        .json(&json!({ "status": "shipping" }))
        .send()
        .await
        .expect("Failed to update order");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = user
        .request(Method::DELETE, &format!("/orders/{order_id}"))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// Take the cart lock for `user` and release it after `hold`, so requests
/// sent meanwhile queue behind it in the order they arrive.
async fn hold_cart(user: &TestUser, hold: Duration) -> Option<impl Future<Output = ()>> {
    let pool = db().await?;
    let mut tx = pool.begin().await.expect("Failed to begin transaction");
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
        .bind(i32::try_from(user.id).expect("user id fits i32"))
        .execute(&mut *tx)
        .await
        .expect("Failed to lock cart");

    Some(async move {
        tokio::time::sleep(hold).await;
        tx.commit().await.expect("Failed to release cart");
    })
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_line_added_during_checkout_stays_in_cart() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let first = create_product(&admin, "10").await;
    let second = create_product(&admin, "3").await;
    let user = TestUser::signup().await;
    let (status, _) = user.add_to_cart(first, 2, None).await;
    assert_eq!(status, StatusCode::CREATED);

    let Some(release) = hold_cart(&user, Duration::from_millis(400)).await else {
        eprintln!("Skipping: SHOP_DATABASE_URL not set");
        return;
    };
    let add = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        user.add_to_cart(second, 1, None).await
    };
    let ((status, order), (added, _), ()) = tokio::join!(user.checkout(), add, release);

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(added, StatusCode::CREATED);
    assert_eq!(order["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cents(&order["total"]), 2000);
    assert_eq!(cents(&order["total"]), lines_total_cents(&order));

    let cart = user.cart().await;
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0]["product"]["id"], second);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_add_during_checkout_does_not_touch_ordered_line() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "10").await;
    let user = TestUser::signup().await;
    let (status, _) = user.add_to_cart(product, 2, None).await;
    assert_eq!(status, StatusCode::CREATED);

    let Some(release) = hold_cart(&user, Duration::from_millis(400)).await else {
        eprintln!("Skipping: SHOP_DATABASE_URL not set");
        return;
    };
    let add = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        user.add_to_cart(product, 5, None).await
    };
    let ((status, order), (added, line), ()) = tokio::join!(user.checkout(), add, release);

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(cents(&order["total"]), 2000);

    // A fresh cart line, not a merge into the ordered one
    assert_eq!(added, StatusCode::CREATED);
    assert_eq!(line["quantity"], 5);
    assert_ne!(line["id"], order["items"][0]["id"]);

    let resp = user
        .request(Method::GET, &format!("/orders/{}", order["id"]))
        .send()
        .await
        .expect("Failed to get order");
    let stored = json_body(resp).await["data"]["order"].clone();
    assert_eq!(stored["items"][0]["quantity"], 2);
    assert_eq!(cents(&stored["total"]), lines_total_cents(&stored));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_order_survives_product_deletion() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "7.25").await;
    let user = TestUser::signup().await;
    user.add_to_cart(product, 2, None).await;
    let (status, order) = user.checkout().await;
    assert_eq!(status, StatusCode::CREATED);
    let name = order["items"][0]["product"]["name"].clone();

    let resp = admin
        .request(Method::DELETE, &format!("/products/{product}"))
        .send()
        .await
        .expect("Failed to delete product");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = user
        .request(Method::GET, &format!("/orders/{}", order["id"]))
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::OK);
    let order = json_body(resp).await["data"]["order"].clone();
    let line = &order["items"][0];
    assert_eq!(line["product"]["id"], Value::Null);
    assert_eq!(line["product"]["name"], name);
    assert_eq!(line["product"]["price"].as_f64(), Some(7.25));
    assert_eq!(cents(&order["total"]), 1450);
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_review_once_per_product() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "5").await;
    let user = TestUser::signup().await;
    let path = format!("/products/{product}/reviews");

    let resp = user
        .request(Method::POST, &path)
        .json(&json!({ "review": "Great", "rating": 4 }))
        .send()
        .await
        .expect("Failed to create review");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let review_id = json_body(resp).await["data"]["review"]["id"]
        .as_i64()
        .expect("review id");

    let resp = user
        .request(Method::POST, &path)
        .json(&json!({ "review": "Again", "rating": 5 }))
        .send()
        .await
        .expect("Failed to create review");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Ratings roll up onto the product
    let resp = user
        .request(Method::GET, &format!("/products/{product}"))
        .send()
        .await
        .expect("Failed to get product");
    let body = json_body(resp).await;
    assert_eq!(body["data"]["product"]["ratingsQuantity"], 1);
    assert_eq!(body["data"]["product"]["ratingsAverage"].as_f64(), Some(4.0));

    // Only the author or an admin may edit
    let stranger = TestUser::signup().await;
    let resp = stranger
        .request(Method::PATCH, &format!("/reviews/{review_id}"))
        .json(&json!({ "rating": 1 }))
        .send()
        .await
        .expect("Failed to update review");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

/// A product's `ratingsAverage` and `ratingsQuantity`.
async fn ratings(user: &TestUser, product: i64) -> (Option<f64>, Option<i64>) {
    let resp = user
        .request(Method::GET, &format!("/products/{product}"))
        .send()
        .await
        .expect("Failed to get product");
    let body = json_body(resp).await;
    (
        body["data"]["product"]["ratingsAverage"].as_f64(),
        body["data"]["product"]["ratingsQuantity"].as_i64(),
    )
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_ratings_follow_review_changes() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "5").await;
    let path = format!("/products/{product}/reviews");

    let mut reviews = Vec::new();
    for rating in [4, 2] {
        let user = TestUser::signup().await;
        let resp = user
            .request(Method::POST, &path)
            .json(&json!({ "review": "Fine", "rating": rating }))
            .send()
            .await
            .expect("Failed to create review");
        assert_eq!(resp.status(), StatusCode::CREATED);
        let id = json_body(resp).await["data"]["review"]["id"]
            .as_i64()
            .expect("review id");
        reviews.push((user, id));
    }
    assert_eq!(ratings(&admin, product).await, (Some(3.0), Some(2)));

    let (author, id) = &reviews[1];
    let resp = author
        .request(Method::PATCH, &format!("/reviews/{id}"))
        .json(&json!({ "rating": 5 }))
        .send()
        .await
        .expect("Failed to update review");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(ratings(&admin, product).await, (Some(4.5), Some(2)));

    let (author, id) = &reviews[0];
    let resp = author
        .request(Method::DELETE, &format!("/reviews/{id}"))
        .send()
        .await
        .expect("Failed to delete review");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(ratings(&admin, product).await, (Some(5.0), Some(1)));

    // Admins may delete any review; no reviews falls back to the default
    let (_, id) = &reviews[1];
    let resp = admin
        .request(Method::DELETE, &format!("/reviews/{id}"))
        .send()
        .await
        .expect("Failed to delete review");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(ratings(&admin, product).await, (Some(4.5), Some(0)));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_deactivated_author_hidden_on_reviews() {
    let Some(admin) = TestUser::admin().await else {
        eprintln!("Skipping: SHOP_TEST_ADMIN_EMAIL not set");
        return;
    };
    let product = create_product(&admin, "5").await;
    let path = format!("/products/{product}/reviews");
    let user = TestUser::signup().await;

    let resp = user
        .request(Method::POST, &path)
        .json(&json!({ "review": "Gone soon", "rating": 3 }))
        .send()
        .await
        .expect("Failed to create review");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = user
        .request(Method::DELETE, "/users/delete-me")
        .send()
        .await
        .expect("Failed to delete account");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = admin
        .request(Method::GET, &path)
        .send()
        .await
        .expect("Failed to list reviews");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["reviews"][0]["user"], Value::Null);
    assert_eq!(body["data"]["reviews"][0]["rating"], 3);
}
