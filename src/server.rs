use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::Layer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

use crate::accounts::CredentialStore;
use crate::api::{self, ApiError};
use crate::config::Config;
use crate::db::SqliteRepository;
use crate::permission::AccessPolicy;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqliteRepository>,
    pub credentials: CredentialStore,
    pub policy: AccessPolicy,
}

impl AppState {
    pub fn new(config: &Config, db: Arc<SqliteRepository>) -> Self {
        let credentials = CredentialStore::new(db.clone(), config.accounts.bcrypt_cost);
        let policy = AccessPolicy::new(config.catalog.movie_read);
        Self {
            db,
            credentials,
            policy,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let movie_routes = Router::new()
        .route("/movie", post(api::movie::create_movie))
        .route("/movie/search", get(api::movie::search_movies))
        .route(
            "/movie/:movie_id",
            get(api::movie::get_movie)
                .put(api::movie::update_movie)
                .patch(api::movie::update_movie)
                .delete(api::movie::delete_movie),
        );

    let user_routes = Router::new()
        .route("/user/register", post(api::user::register))
        .route("/user/login", post(api::user::login))
        .route("/user/logout", post(api::user::logout))
        .route(
            "/user/details",
            get(api::user::get_details)
                .put(api::user::update_details)
                .patch(api::user::update_details)
                .delete(api::user::delete_details),
        )
        .route(
            "/user/change_password",
            post(api::user::change_password).put(api::user::change_password),
        );

    Router::new()
        .merge(movie_routes)
        .merge(user_routes)
        .fallback(fallback_handler)
        .layer(from_fn_with_state(state.clone(), api::auth_middleware))
        .layer(from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The router wrapped so that `/movie/1/` and `/movie/1` route alike.
/// Path normalization has to happen before routing, so it wraps the router
/// rather than being one of its layers.
pub fn build_app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state))
}

async fn fallback_handler() -> ApiError {
    ApiError::NotFound
}
