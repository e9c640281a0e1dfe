//! HTTP-level tests for registration, login and account self-service.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{spawn_app, PASSWORD};
use reelbase::db::AccountRepo;

fn placeholder_user() -> Value {
    json!({
        "first_name": "Placeholder",
        "last_name": "User",
        "email": "placeholder@example.com",
        "username": "placeholder_user",
        "password": "efgh5678",
    })
}

#[tokio::test]
async fn register_creates_account_without_password_in_response() {
    let app = spawn_app().await;

    let (status, body) = app.post("/user/register/", None, placeholder_user()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "placeholder_user");
    assert_eq!(body["email"], "placeholder@example.com");
    assert_eq!(body["is_staff"], false);
    assert!(body.get("password").is_none());

    let stored = app
        .state
        .db
        .get_account_by_username("placeholder_user")
        .await
        .unwrap();
    assert_ne!(stored.password, "efgh5678");
}

#[tokio::test]
async fn register_cannot_grant_staff() {
    let app = spawn_app().await;
    let mut body = placeholder_user();
    body["is_staff"] = json!(true);

    let (status, body) = app.post("/user/register/", None, body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_staff"], false);
}

#[tokio::test]
async fn register_duplicate_username_fails() {
    let app = spawn_app().await;
    app.post("/user/register/", None, placeholder_user()).await;

    let (status, body) = app.post("/user/register/", None, placeholder_user()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"username": ["A user with that username already exists."]})
    );
}

#[tokio::test]
async fn register_validates_fields() {
    let app = spawn_app().await;

    let (status, body) = app
        .post("/user/register/", None, json!({"username": "no spaces", "email": "bogus"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());
    assert_eq!(body["email"], json!(["Enter a valid email address."]));
    assert_eq!(body["password"], json!(["This field is required."]));
}

#[tokio::test]
async fn login_issues_working_token() {
    let app = spawn_app().await;
    app.post("/user/register/", None, placeholder_user()).await;

    let (status, body) = app
        .post(
            "/user/login/",
            None,
            json!({"username": "placeholder_user", "password": "efgh5678"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "placeholder_user");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, details) = app.get("/user/details/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["username"], "placeholder_user");

    let stored = app
        .state
        .db
        .get_account_by_username("placeholder_user")
        .await
        .unwrap();
    assert!(stored.last_login.is_some());
}

#[tokio::test]
async fn login_with_wrong_password_fails() {
    let app = spawn_app().await;
    app.create_account("tester", false).await;

    let (status, body) = app
        .post("/user/login/", None, json!({"username": "tester", "password": "nope"}))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid username/password.");
}

#[tokio::test]
async fn logout_revokes_token() {
    let app = spawn_app().await;
    let token = app.member_token().await;

    let (status, _) = app.send(Method::POST, "/user/logout/", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get("/user/details/", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token.");
}

#[tokio::test]
async fn details_require_authentication() {
    let app = spawn_app().await;

    let (status, body) = app.get("/user/details/", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Authentication credentials were not provided.");
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let app = spawn_app().await;

    let (status, body) = app.get("/movie/1/", Some("not-a-token")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token.");
}

#[tokio::test]
async fn update_details_changes_only_given_fields() {
    let app = spawn_app().await;
    let token = app.member_token().await;

    let (status, body) = app
        .put("/user/details/", Some(&token), json!({"email": "member1@example.com"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "member1@example.com");
    assert_eq!(body["username"], "member");
}

#[tokio::test]
async fn update_details_rejects_password() {
    let app = spawn_app().await;
    let token = app.member_token().await;

    let (status, body) = app
        .put("/user/details/", Some(&token), json!({"password": "abcd1239"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"non_field_errors": ["Password update is not allowed"]}));
}

#[tokio::test]
async fn update_details_rejects_taken_username() {
    let app = spawn_app().await;
    app.create_account("taken", false).await;
    let token = app.member_token().await;

    let (status, body) = app
        .put("/user/details/", Some(&token), json!({"username": "taken"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["username"], json!(["A user with that username already exists."]));
}

#[tokio::test]
async fn delete_account_deactivates_it() {
    let app = spawn_app().await;
    let token = app.member_token().await;

    let (status, _) = app.delete("/user/details/", Some(&token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let stored = app.state.db.get_account_by_username("member").await.unwrap();
    assert!(!stored.is_active);

    let (status, _) = app
        .post("/user/login/", None, json!({"username": "member", "password": PASSWORD}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/user/details/", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_with_wrong_old_password_fails() {
    let app = spawn_app().await;
    let token = app.member_token().await;

    let (status, body) = app
        .post(
            "/user/change_password/",
            Some(&token),
            json!({"old_password": "wrong-one", "new_password": "asdf9000"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"old_password": ["Wrong password."]}));
}

#[tokio::test]
async fn change_password_replaces_credential() {
    let app = spawn_app().await;
    let token = app.member_token().await;

    let (status, body) = app
        .post(
            "/user/change_password/",
            Some(&token),
            json!({"old_password": PASSWORD, "new_password": "asdf9000"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Success."));

    let (status, _) = app
        .post("/user/login/", None, json!({"username": "member", "password": "asdf9000"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/user/login/", None, json!({"username": "member", "password": PASSWORD}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_enforces_minimum_length() {
    let app = spawn_app().await;
    let token = app.member_token().await;

    let (status, body) = app
        .post(
            "/user/change_password/",
            Some(&token),
            json!({"old_password": PASSWORD, "new_password": "short"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["new_password"],
        json!(["Ensure this field has at least 8 characters."])
    );
}

#[tokio::test]
async fn register_trims_password() {
    let app = spawn_app().await;
    let mut body = placeholder_user();
    body["password"] = json!(" efgh5678 ");
    app.post("/user/register/", None, body).await;

    let (status, _) = app
        .post(
            "/user/login/",
            None,
            json!({"username": "placeholder_user", "password": "efgh5678"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn basic_auth_identifies_caller() {
    let app = spawn_app().await;
    app.create_account("member", false).await;

    let (status, body) = app
        .send_basic(Method::GET, "/user/details/", "member", PASSWORD)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "member");

    let stored = app.state.db.get_account_by_username("member").await.unwrap();
    assert!(stored.last_login.is_none());
}

#[tokio::test]
async fn basic_auth_with_wrong_password_fails() {
    let app = spawn_app().await;
    app.create_account("member", false).await;

    let (status, body) = app
        .send_basic(Method::GET, "/movie/search/", "member", "wrong")
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid username/password.");
}

#[tokio::test]
async fn basic_auth_for_deactivated_account_fails() {
    let app = spawn_app().await;
    app.create_account("member", false).await;

    let (status, _) = app
        .send_basic(Method::DELETE, "/user/details/", "member", PASSWORD)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send_basic(Method::GET, "/user/details/", "member", PASSWORD)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid username/password.");
}

#[tokio::test]
async fn malformed_basic_header_is_rejected() {
    let app = spawn_app().await;

    let (status, body) = app
        .send_authorized(Method::GET, "/user/details/", Some("Basic not*base64"), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["detail"],
        "Invalid basic header. Credentials not correctly base64 encoded."
    );
}
