//! Registration, login, and token lifecycle tests.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;

// ===========================================================================
// Registration
// ===========================================================================

#[tokio::test]
async fn register_candidate_creates_profile() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "email": "reg_candidate@example.com",
                "password": "longenoughpw",
                "confirm_password": "longenoughpw",
                "first_name": "Rae",
                "last_name": "Diaz",
                "role": "candidate",
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["user"]["email"], "reg_candidate@example.com");
    assert_eq!(body["user"]["role"], "candidate");
    assert!(body["tokens"]["access_token"].is_string());

    // Registration must leave a candidate profile behind.
    let user_id: uuid::Uuid =
        serde_json::from_value(body["user"]["id"].clone()).expect("user id");
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM candidate_profiles WHERE user_id = $1)",
    )
    .bind(user_id)
    .fetch_one(app.pool())
    .await
    .expect("profile check");
    assert!(exists);
}

#[tokio::test]
async fn register_rejects_admin_role() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "email": "reg_admin@example.com",
                "password": "longenoughpw",
                "confirm_password": "longenoughpw",
                "first_name": "Sam",
                "last_name": "Admin",
                "role": "admin",
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_duplicate_email_conflicts() {
    let app = app().await;
    let user = app.create_candidate("reg_dup").await;

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "email": user.email,
                "password": "longenoughpw",
                "confirm_password": "longenoughpw",
                "first_name": "Dup",
                "last_name": "User",
                "role": "candidate",
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "email already registered");
}

#[tokio::test]
async fn register_short_password_rejected() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "email": "reg_shortpw@example.com",
                "password": "short",
                "confirm_password": "short",
                "first_name": "A",
                "last_name": "B",
                "role": "candidate",
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_mismatched_confirmation_rejected() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "email": "reg_mismatch@example.com",
                "password": "longenoughpw",
                "confirm_password": "differentenough",
                "first_name": "Mia",
                "last_name": "Chen",
                "role": "candidate",
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "passwords do not match");
}

// ===========================================================================
// Login
// ===========================================================================

#[tokio::test]
async fn login_valid_credentials() {
    let app = app().await;
    let user = app.create_candidate("login_valid").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["tokens"]["access_token"].is_string());
    assert!(body["tokens"]["refresh_token"].is_string());
    assert_eq!(body["user"]["role"], "candidate");
}

#[tokio::test]
async fn login_invalid_password() {
    let app = app().await;
    let user = app.create_candidate("login_badpw").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": user.email, "password": "wrong_password" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn login_nonexistent_user() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": "whatever123" }),
            None,
        )
        .await;

    // Same 401 as wrong password, no user enumeration.
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn login_deactivated_account_rejected() {
    let app = app().await;
    let user = app.create_candidate("login_inactive").await;

    sqlx::query("UPDATE users SET is_active = false WHERE id = $1")
        .bind(user.id)
        .execute(app.pool())
        .await
        .expect("deactivate user");

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Token lifecycle
// ===========================================================================

#[tokio::test]
async fn refresh_rotates_token() {
    let app = app().await;
    let user = app.create_candidate("refresh_rotate").await;

    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let new_refresh = body["refresh_token"].as_str().expect("new refresh token");
    assert_ne!(new_refresh, user.refresh_token);

    // The old token was rotated out and cannot be used again.
    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    // The replacement still works.
    let resp = app
        .post_json("/auth/refresh", json!({ "refresh_token": new_refresh }), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn revoked_refresh_token_is_dead() {
    let app = app().await;
    let user = app.create_candidate("revoke_tok").await;

    let resp = app
        .post_json(
            "/auth/revoke",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_token() {
    let app = app().await;

    let resp = app.get("/auth/me", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get("/auth/me", Some("not-a-token")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_current_user() {
    let app = app().await;
    let user = app.create_employer("me_employer").await;

    let resp = app.get("/auth/me", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["email"], user.email);
    assert_eq!(body["role"], "employer");
}
