use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    Json,
};
use tracing::{debug, info};

use super::auth::{authorize, Identity};
use super::error::{ApiError, ApiJson, ApiResult};
use super::types::MovieDto;
use crate::catalog::{movie::unique_together_message, resolve_genres, MovieFilter, MovieInput};
use crate::db::{DbError, MovieRepo};
use crate::permission::Operation;
use crate::server::AppState;
use crate::util::QueryParams;

/// Movie ids are positive decimal integers. Anything else names no movie.
fn parse_movie_id(raw: &str) -> ApiResult<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::NotFound);
    }
    raw.parse::<i64>().map_err(|_| ApiError::NotFound)
}

fn movie_write_error(err: DbError) -> ApiError {
    match err {
        DbError::AlreadyExists(_) => ApiError::Conflict(unique_together_message().to_string()),
        other => other.into(),
    }
}

/// POST /movie/
pub async fn create_movie(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<ApiJson<MovieInput>, ApiError>,
) -> ApiResult<(StatusCode, Json<MovieDto>)> {
    authorize(state.policy.movie_create.as_ref(), &identity, Operation::Create)?;
    let ApiJson(input) = payload?;
    let (movie, genre_names) = input.into_new_movie()?;

    if state.db.find_movie(&movie.name, &movie.director).await?.is_some() {
        return Err(ApiError::Conflict(unique_together_message().to_string()));
    }

    let genres = resolve_genres(&*state.db, &genre_names).await?;
    let created = state
        .db
        .create_movie(&movie, &genres)
        .await
        .map_err(movie_write_error)?;

    info!(movie = created.id, name = %created.name, director = %created.director, "movie created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /movie/:movie_id/
pub async fn get_movie(
    State(state): State<AppState>,
    identity: Identity,
    method: Method,
    Path(movie_id): Path<String>,
) -> ApiResult<Json<MovieDto>> {
    authorize(state.policy.movie_detail.as_ref(), &identity, Operation::from_method(&method))?;
    let id = parse_movie_id(&movie_id)?;
    let movie = state.db.get_movie(id).await?;
    Ok(Json(movie.into()))
}

/// PUT and PATCH /movie/:movie_id/
///
/// Both are partial: only the supplied fields change, and supplied genres
/// are added to the movie's existing genres.
pub async fn update_movie(
    State(state): State<AppState>,
    identity: Identity,
    method: Method,
    Path(movie_id): Path<String>,
    payload: Result<ApiJson<MovieInput>, ApiError>,
) -> ApiResult<Json<MovieDto>> {
    authorize(state.policy.movie_detail.as_ref(), &identity, Operation::from_method(&method))?;
    let id = parse_movie_id(&movie_id)?;
    let current = state.db.get_movie(id).await?;

    let ApiJson(input) = payload?;
    let (changes, genre_names) = input.into_changes()?;

    let name = changes.name.as_deref().unwrap_or(&current.name);
    let director = changes.director.as_deref().unwrap_or(&current.director);
    if let Some(other) = state.db.find_movie(name, director).await? {
        if other.id != id {
            return Err(ApiError::Conflict(unique_together_message().to_string()));
        }
    }

    let genres = resolve_genres(&*state.db, &genre_names).await?;
    let updated = state
        .db
        .update_movie(id, &changes, &genres)
        .await
        .map_err(movie_write_error)?;

    info!(movie = id, "movie updated");
    Ok(Json(updated.into()))
}

/// DELETE /movie/:movie_id/
pub async fn delete_movie(
    State(state): State<AppState>,
    identity: Identity,
    Path(movie_id): Path<String>,
) -> ApiResult<StatusCode> {
    authorize(state.policy.movie_detail.as_ref(), &identity, Operation::Delete)?;
    let id = parse_movie_id(&movie_id)?;
    state.db.delete_movie(id).await?;
    info!(movie = id, "movie deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /movie/search/
pub async fn search_movies(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<MovieDto>>> {
    authorize(state.policy.movie_search.as_ref(), &identity, Operation::Read)?;
    let filter = MovieFilter::from_params(&params)?;
    let movies = state.db.search_movies(&filter).await?;
    debug!(?filter, results = movies.len(), "movie search");
    Ok(Json(movies.into_iter().map(MovieDto::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_movie_id() {
        assert_eq!(parse_movie_id("42").unwrap(), 42);
        assert!(matches!(parse_movie_id("abc"), Err(ApiError::NotFound)));
        assert!(matches!(parse_movie_id("+4"), Err(ApiError::NotFound)));
        assert!(matches!(parse_movie_id("-1"), Err(ApiError::NotFound)));
        assert!(matches!(parse_movie_id(""), Err(ApiError::NotFound)));
        assert!(matches!(parse_movie_id("99999999999999999999999"), Err(ApiError::NotFound)));
    }
}
