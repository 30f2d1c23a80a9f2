//! Account and authentication flows.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (cargo run -p shop-cli -- migrate)
//! - The API server running (cargo run -p shop-api)

#![allow(clippy::print_stderr)]

use reqwest::{Method, StatusCode};
use serde_json::json;

use shop_integration_tests::{TEST_PASSWORD, TestUser, api, client, db, json_body, set_reset_token};

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_signup_sets_cookie_and_me_works() {
    let user = TestUser::signup().await;

    // The cookie alone authenticates
    let resp = user
        .client
        .get(api("/users/me"))
        .send()
        .await
        .expect("Failed to get me");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["data"]["user"]["email"], user.email.as_str());
    assert!(body["data"]["user"].get("password").is_none());
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_duplicate_email_rejected() {
    let user = TestUser::signup().await;
    let resp = client()
        .post(api("/users/signup"))
        .json(&json!({
            "name": "Again",
            "email": user.email,
            "password": TEST_PASSWORD,
            "confirmPassword": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to sign up");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert!(
        body["message"]
            .as_str()
            .unwrap_or_default()
            .starts_with("Duplicate field value")
    );
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_signin_failures() {
    let user = TestUser::signup().await;

    let resp = client()
        .post(api("/users/signin"))
        .json(&json!({ "email": user.email }))
        .send()
        .await
        .expect("Failed to sign in");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client()
        .post(api("/users/signin"))
        .json(&json!({ "email": user.email, "password": "wrong-password" }))
        .send()
        .await
        .expect("Failed to sign in");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["message"], "Incorrect email or password");
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_password_change_invalidates_old_token() {
    let user = TestUser::signup().await;

    let resp = user
        .request(Method::PATCH, "/users/update-my-password")
        .json(&json!({
            "passwordCurrent": "not-the-password",
            "password": "brand-new-pass",
            "confirmPassword": "brand-new-pass",
        }))
        .send()
        .await
        .expect("Failed to update password");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = user
        .request(Method::PATCH, "/users/update-my-password")
        .json(&json!({
            "passwordCurrent": TEST_PASSWORD,
            "password": "brand-new-pass",
            "confirmPassword": "brand-new-pass",
        }))
        .send()
        .await
        .expect("Failed to update password");
    assert_eq!(resp.status(), StatusCode::OK);
    let fresh = json_body(resp).await["token"]
        .as_str()
        .expect("token")
        .to_string();

    // Tokens issued before the change stop working
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    let resp = user
        .request(Method::GET, "/users/me")
        .send()
        .await
        .expect("Failed to get me");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client()
        .get(api("/users/me"))
        .bearer_auth(fresh)
        .send()
        .await
        .expect("Failed to get me");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_update_me_rejects_password_fields() {
    let user = TestUser::signup().await;
    let form = reqwest::multipart::Form::new()
        .text("name", "Renamed")
        .text("password", "sneaky-password");

    let resp = user
        .request(Method::PATCH, "/users/update-me")
        .multipart(form)
        .send()
        .await
        .expect("Failed to update me");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let form = reqwest::multipart::Form::new().text("name", "Renamed");
    let resp = user
        .request(Method::PATCH, "/users/update-me")
        .multipart(form)
        .send()
        .await
        .expect("Failed to update me");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["data"]["user"]["name"], "Renamed");
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_delete_me_deactivates() {
    let user = TestUser::signup().await;

    let resp = user
        .request(Method::DELETE, "/users/delete-me")
        .send()
        .await
        .expect("Failed to delete me");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = user
        .request(Method::GET, "/users/me")
        .send()
        .await
        .expect("Failed to get me");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(resp).await["message"],
        "The user belonging to this token does no longer exist."
    );
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_forgot_password_unknown_email() {
    let resp = client()
        .post(api("/users/forgot-password"))
        .json(&json!({ "email": "nobody-here@example.com" }))
        .send()
        .await
        .expect("Failed to request reset");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client()
        .patch(api("/users/reset-password/not-a-real-token"))
        .json(&json!({ "password": "whatever-123", "confirmPassword": "whatever-123" }))
        .send()
        .await
        .expect("Failed to reset");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Token is invalid or has expired");
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_reset_password_with_token() {
    let Some(pool) = db().await else {
        eprintln!("Skipping: SHOP_DATABASE_URL not set");
        return;
    };
    let user = TestUser::signup().await;
    let token = uuid::Uuid::new_v4().simple().to_string();
    set_reset_token(&pool, user.id, &token, 600).await;
    let path = api(&format!("/users/reset-password/{token}"));

    // Password rules still apply
    let resp = client()
        .patch(&path)
        .json(&json!({ "password": "reset-pass-1", "confirmPassword": "something-else" }))
        .send()
        .await
        .expect("Failed to reset password");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client()
        .patch(&path)
        .json(&json!({ "password": "reset-pass-1", "confirmPassword": "reset-pass-1" }))
        .send()
        .await
        .expect("Failed to reset password");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(body["token"].is_string());
    assert_eq!(body["data"]["user"]["id"], user.id);

    let resp = client()
        .post(api("/users/signin"))
        .json(&json!({ "email": user.email, "password": "reset-pass-1" }))
        .send()
        .await
        .expect("Failed to sign in");
    assert_eq!(resp.status(), StatusCode::OK);

    // Tokens are single use
    let resp = client()
        .patch(&path)
        .json(&json!({ "password": "reset-pass-2", "confirmPassword": "reset-pass-2" }))
        .send()
        .await
        .expect("Failed to reset password");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Token is invalid or has expired");
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_reset_password_expired_token() {
    let Some(pool) = db().await else {
        eprintln!("Skipping: SHOP_DATABASE_URL not set");
        return;
    };
    let user = TestUser::signup().await;
    let token = uuid::Uuid::new_v4().simple().to_string();
    set_reset_token(&pool, user.id, &token, -60).await;

    let resp = client()
        .patch(api(&format!("/users/reset-password/{token}")))
        .json(&json!({ "password": "reset-pass-1", "confirmPassword": "reset-pass-1" }))
        .send()
        .await
        .expect("Failed to reset password");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Token is invalid or has expired");

    // The old password keeps working
    let resp = client()
        .post(api("/users/signin"))
        .json(&json!({ "email": user.email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to sign in");
    assert_eq!(resp.status(), StatusCode::OK);
}
