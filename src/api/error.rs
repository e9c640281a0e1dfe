use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::accounts::CredentialError;
use crate::db::DbError;
use crate::validation::{FieldErrors, NON_FIELD_ERRORS};

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("You do not have permission to perform this action.")]
    Authorization,
    #[error("Not found.")]
    NotFound,
    #[error("Wrong password.")]
    WrongCredential,
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_authenticated() -> Self {
        ApiError::Authentication(NOT_AUTHENTICATED.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::Conflict(message) => (
                StatusCode::BAD_REQUEST,
                Json(FieldErrors::single(NON_FIELD_ERRORS, message)),
            )
                .into_response(),
            ApiError::Authentication(detail) => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Token")],
                Json(json!({ "detail": detail })),
            )
                .into_response(),
            ApiError::Authorization => (
                StatusCode::FORBIDDEN,
                Json(json!({ "detail": "You do not have permission to perform this action." })),
            )
                .into_response(),
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response()
            }
            ApiError::WrongCredential => (
                StatusCode::BAD_REQUEST,
                Json(FieldErrors::single("old_password", "Wrong password.")),
            )
                .into_response(),
            ApiError::Internal(message) => {
                error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "A server error occurred." })),
                )
                    .into_response()
            }
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(_) => ApiError::NotFound,
            DbError::AlreadyExists(what) => ApiError::Conflict(format!("{} already exists.", what)),
            DbError::Sqlx(e) => ApiError::Internal(format!("Database error: {}", e)),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidCredentials | CredentialError::InvalidToken => {
                ApiError::Authentication(err.to_string())
            }
            CredentialError::Database(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(FieldErrors::single(NON_FIELD_ERRORS, rejection.body_text()))
    }
}

/// JSON body extractor whose rejection is a field-keyed validation error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
