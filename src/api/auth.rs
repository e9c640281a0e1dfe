use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use super::error::ApiError;
use crate::db::Account;
use crate::permission::{Operation, Permission};
use crate::server::AppState;

/// Who is making the request. Resolved once by [`auth_middleware`] and
/// handed to handlers as an extractor.
#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    Account(Account),
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Account(_))
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Identity::Account(account) if account.is_staff && account.is_active)
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            Identity::Account(account) => Some(account),
            Identity::Anonymous => None,
        }
    }

    /// The caller's own account, or a 401 for anonymous callers.
    pub fn require_account(&self) -> Result<&Account, ApiError> {
        self.account().ok_or_else(ApiError::not_authenticated)
    }

    #[cfg(test)]
    pub(crate) fn test_account(is_staff: bool) -> Self {
        Identity::Account(Account {
            id: 1,
            username: "tester".to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            password: String::new(),
            is_staff,
            is_active: true,
            date_joined: chrono::Utc::now(),
            last_login: None,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned().unwrap_or_default())
    }
}

/// Credentials carried by the `Authorization` header.
#[derive(Debug, PartialEq)]
enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

/// Resolve the request's credentials, if any, into an [`Identity`].
///
/// A request without credentials continues anonymously. A token or a
/// username/password pair that does not resolve to an active account is
/// rejected with 401 right here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let account = match parse_credentials(req.headers())? {
        Some(Credentials::Token(token)) => Some(state.credentials.resolve_token(&token).await?),
        Some(Credentials::Basic { username, password }) => {
            Some(state.credentials.verify(&username, &password).await?)
        }
        None => None,
    };

    let identity = match account {
        Some(account) => {
            debug!(account = account.id, username = %account.username, "authenticated request");
            Identity::Account(account)
        }
        None => Identity::Anonymous,
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn parse_credentials(headers: &HeaderMap) -> Result<Option<Credentials>, ApiError> {
    if let Some(token) = extract_token(headers) {
        return Ok(Some(Credentials::Token(token)));
    }
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let value = value.trim();
    let (scheme, encoded) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("basic") {
        return Ok(None);
    }
    decode_basic(encoded.trim()).map(Some)
}

/// Decode the `user:password` payload of a Basic header. The password may
/// itself contain colons.
fn decode_basic(encoded: &str) -> Result<Credentials, ApiError> {
    if encoded.is_empty() {
        return Err(basic_header_error("No credentials provided."));
    }
    if encoded.contains(char::is_whitespace) {
        return Err(basic_header_error("Credentials string should not contain spaces."));
    }
    let decoded = STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| basic_header_error("Credentials not correctly base64 encoded."))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| basic_header_error("Credentials not correctly base64 encoded."))?;
    Ok(Credentials::Basic {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn basic_header_error(reason: &str) -> ApiError {
    ApiError::Authentication(format!("Invalid basic header. {}", reason))
}

/// Accepts `Authorization: Token <token>` and `Authorization: Bearer <token>`.
/// Other schemes are ignored.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Evaluate a permission, choosing 401 or 403 by whether the caller is known.
pub fn authorize(permission: &dyn Permission, identity: &Identity, operation: Operation) -> Result<(), ApiError> {
    if permission.is_allowed(identity, operation) {
        return Ok(());
    }
    if identity.is_authenticated() {
        Err(ApiError::Authorization)
    } else {
        Err(ApiError::not_authenticated())
    }
}
