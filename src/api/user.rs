use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::info;

use super::auth::{authorize, extract_token, Identity};
use super::error::{ApiError, ApiJson, ApiResult};
use super::types::{AccountDto, LoginRequest, LoginResponse};
use crate::accounts::{profile::username_taken, CredentialError, PasswordChange, ProfileUpdate, RegistrationInput};
use crate::db::{AccountRepo, DbError};
use crate::permission::Operation;
use crate::server::AppState;
use crate::validation::{self, FieldErrors};

fn username_conflict() -> ApiError {
    ApiError::Validation(FieldErrors::single("username", username_taken()))
}

/// POST /user/register/
pub async fn register(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<ApiJson<RegistrationInput>, ApiError>,
) -> ApiResult<(StatusCode, Json<AccountDto>)> {
    authorize(state.policy.registration.as_ref(), &identity, Operation::Create)?;
    let ApiJson(input) = payload?;
    let registration = input.validate()?;

    let account = match state.credentials.create_account(registration, false).await {
        Ok(account) => account,
        Err(CredentialError::Database(DbError::AlreadyExists(_))) => return Err(username_conflict()),
        Err(e) => return Err(e.into()),
    };
    Ok((StatusCode::CREATED, Json(AccountDto::from(&account))))
}

/// POST /user/login/
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let mut errors = FieldErrors::new();
    let username = validation::check_text(&mut errors, "username", request.username.as_deref(), usize::MAX);
    if request.password.is_none() {
        errors.add("password", validation::required());
    }
    let (Some(username), Some(password)) = (username, request.password) else {
        return Err(errors.into());
    };

    let account = state.credentials.authenticate(&username, &password).await?;
    let token = state.credentials.issue_token(&account).await?;
    info!(account = account.id, username = %account.username, "login");

    Ok(Json(LoginResponse {
        token,
        user: AccountDto::from(&account),
    }))
}

/// POST /user/logout/
///
/// Revokes the token the request was made with.
pub async fn logout(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    authorize(state.policy.account.as_ref(), &identity, Operation::Create)?;
    if let Some(token) = extract_token(&headers) {
        state.credentials.revoke_token(&token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /user/details/
pub async fn get_details(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<AccountDto>> {
    authorize(state.policy.account.as_ref(), &identity, Operation::Read)?;
    let account = identity.require_account()?;
    Ok(Json(AccountDto::from(account)))
}

/// PUT and PATCH /user/details/
pub async fn update_details(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<ApiJson<ProfileUpdate>, ApiError>,
) -> ApiResult<Json<AccountDto>> {
    authorize(state.policy.account.as_ref(), &identity, Operation::Update)?;
    let account = identity.require_account()?;
    let ApiJson(update) = payload?;
    let changes = update.into_changes()?;

    let updated = match state.db.update_account(account.id, &changes).await {
        Ok(updated) => updated,
        Err(DbError::AlreadyExists(_)) => return Err(username_conflict()),
        Err(e) => return Err(e.into()),
    };
    info!(account = updated.id, "profile updated");
    Ok(Json(AccountDto::from(&updated)))
}

/// DELETE /user/details/
///
/// Deactivates the account. The row is kept.
pub async fn delete_details(State(state): State<AppState>, identity: Identity) -> ApiResult<StatusCode> {
    authorize(state.policy.account.as_ref(), &identity, Operation::Delete)?;
    let account = identity.require_account()?;
    state.credentials.deactivate(account.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /user/change_password/
pub async fn change_password(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<ApiJson<PasswordChange>, ApiError>,
) -> ApiResult<Json<&'static str>> {
    authorize(state.policy.account.as_ref(), &identity, Operation::Update)?;
    let account = identity.require_account()?;
    let ApiJson(change) = payload?;
    let (old_password, new_password) = change.validate()?;

    if !state.credentials.check_password(account, &old_password).await? {
        return Err(ApiError::WrongCredential);
    }
    state.credentials.set_password(account.id, &new_password).await?;
    Ok(Json("Success."))
}
