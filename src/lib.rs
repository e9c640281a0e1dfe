pub mod accounts;
pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod middleware;
pub mod permission;
pub mod server;
pub mod util;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::Request, ServiceExt};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),
    #[error("Account error: {0}")]
    Credential(#[from] accounts::CredentialError),
    #[error("Invalid account: {0}")]
    Validation(#[from] validation::FieldErrors),
    #[error("Server error: {0}")]
    Server(String),
}

/// Fields for an account created from the command line.
#[derive(Debug, Clone)]
pub struct AccountArgs {
    pub username: String,
    pub password: String,
    pub email: String,
    pub is_staff: bool,
}

fn load_config(config_path: &str) -> Result<config::Config, ServerError> {
    let config = config::Config::from_file(config_path)?;
    config.validate()?;
    info!("Using config file: {}", config_path);
    Ok(config)
}

async fn open_database(config: &config::Config) -> Result<Arc<db::SqliteRepository>, ServerError> {
    let db_path = config
        .get_database_path()
        .ok_or_else(|| ServerError::Server("No database path configured".to_string()))?;

    info!("Opening database at {}", db_path);
    Ok(Arc::new(db::SqliteRepository::new(&db_path).await?))
}

pub async fn run(config_path: &str, debug_logs: bool) -> Result<(), ServerError> {
    let config = load_config(config_path)?;
    if debug_logs {
        info!("Debug logging enabled");
    }
    info!("Movie read access: {:?}", config.catalog.movie_read);

    let db = open_database(&config).await?;

    let address = config.listen.address.as_deref().unwrap_or("[::]");
    let port = &config.listen.port;
    let addr: SocketAddr = format!("{}:{}", address, port)
        .parse()
        .map_err(|e| ServerError::Server(format!("Invalid address: {}", e)))?;

    let tls_paths = config.listen.tlscert.clone().zip(config.listen.tlskey.clone());

    let state = server::AppState::new(&config, db.clone());
    let app = server::build_app(state);

    if let Some((cert_path, key_path)) = tls_paths {
        info!("Loading TLS certificate from {}", cert_path);
        info!("Loading TLS key from {}", key_path);

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to load TLS config: {}", e)))?;

        info!("Serving HTTPS on {}", addr);

        axum_server::bind_rustls(addr, tls_config)
            .serve(ServiceExt::<Request>::into_make_service(app))
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    } else {
        info!("Serving HTTP on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    }

    db.close().await;
    Ok(())
}

/// Create an account directly in the configured database. This is the only
/// way to create a staff account.
pub async fn create_account(config_path: &str, args: AccountArgs) -> Result<db::Account, ServerError> {
    let config = load_config(config_path)?;
    let db = open_database(&config).await?;

    let registration = accounts::RegistrationInput {
        username: Some(args.username),
        password: Some(args.password),
        email: args.email,
        first_name: String::new(),
        last_name: String::new(),
    }
    .validate()?;

    let store = accounts::CredentialStore::new(db.clone(), config.accounts.bcrypt_cost);
    let account = store.create_account(registration, args.is_staff).await?;
    db.close().await;
    Ok(account)
}
