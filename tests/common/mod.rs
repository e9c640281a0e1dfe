#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;

use reelbase::accounts::Registration;
use reelbase::config::{Config, MovieReadPolicy};
use reelbase::db::{Account, SqliteRepository};
use reelbase::server::{build_app, AppState};

pub const PASSWORD: &str = "abcd1234";

pub struct TestApp {
    pub app: NormalizePath<Router>,
    pub state: AppState,
}

/// Full application over a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(MovieReadPolicy::Open).await
}

pub async fn spawn_app_with(movie_read: MovieReadPolicy) -> TestApp {
    let mut config = Config::default();
    config.accounts.bcrypt_cost = 4;
    config.catalog.movie_read = movie_read;

    let db = Arc::new(
        SqliteRepository::new("sqlite::memory:")
            .await
            .expect("in-memory database should open"),
    );
    let state = AppState::new(&config, db);
    TestApp {
        app: build_app(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn create_account(&self, username: &str, is_staff: bool) -> Account {
        self.state
            .credentials
            .create_account(
                Registration {
                    username: username.to_string(),
                    password: PASSWORD.to_string(),
                    email: format!("{username}@example.com"),
                    first_name: String::new(),
                    last_name: String::new(),
                },
                is_staff,
            )
            .await
            .expect("account creation should succeed")
    }

    /// Create an account and return an access token for it.
    pub async fn login_as(&self, username: &str, is_staff: bool) -> String {
        let account = self.create_account(username, is_staff).await;
        self.state
            .credentials
            .issue_token(&account)
            .await
            .expect("token issue should succeed")
    }

    pub async fn staff_token(&self) -> String {
        self.login_as("admin", true).await
    }

    pub async fn member_token(&self) -> String {
        self.login_as("member", false).await
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let authorization = token.map(|token| format!("Token {token}"));
        self.send_authorized(method, uri, authorization.as_deref(), body).await
    }

    /// Send with HTTP Basic credentials instead of a token.
    pub async fn send_basic(&self, method: Method, uri: &str, username: &str, password: &str) -> (StatusCode, Value) {
        let authorization = format!("Basic {}", STANDARD.encode(format!("{username}:{password}")));
        self.send_authorized(method, uri, Some(&authorization), None).await
    }

    /// Send with a raw `Authorization` header value.
    pub async fn send_authorized(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(authorization) = authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response.into_body()).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, token, None).await
    }
}

/// Empty bodies decode as `Value::Null`.
pub async fn body_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
