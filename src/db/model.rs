use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub name: String,
    pub director: String,
    pub imdb_score: Option<f64>,
    pub popularity: Option<f64>,
    /// Sorted by name.
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MovieRow {
    pub id: i64,
    pub name: String,
    pub director: String,
    pub imdb_score: Option<f64>,
    pub popularity: Option<f64>,
}

impl MovieRow {
    pub fn into_movie(self, genres: Vec<Genre>) -> Movie {
        Movie {
            id: self.id,
            name: self.name,
            director: self.director,
            imdb_score: self.imdb_score,
            popularity: self.popularity,
            genres,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub name: String,
    pub director: String,
    pub imdb_score: Option<f64>,
    pub popularity: Option<f64>,
}

/// Columns to overwrite on a partial update. `None` leaves a column alone;
/// `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieChanges {
    pub name: Option<String>,
    pub director: Option<String>,
    pub imdb_score: Option<Option<f64>>,
    pub popularity: Option<Option<f64>>,
}

impl MovieChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.director.is_none()
            && self.imdb_score.is_none()
            && self.popularity.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Already hashed.
    pub password: String,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
    pub token_hash: String,
    pub account_id: i64,
    pub created: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl DbError {
    pub(crate) fn from_write(e: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::AlreadyExists(what())
            }
            _ => DbError::Sqlx(e),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
