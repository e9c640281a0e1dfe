use serde::{Deserialize, Serialize};

use crate::db::{Account, Movie};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDto {
    pub id: i64,
    pub name: String,
    pub director: String,
    pub imdb_score: Option<f64>,
    pub popularity: Option<f64>,
    /// Genre names.
    pub genre: Vec<String>,
}

impl From<Movie> for MovieDto {
    fn from(movie: Movie) -> Self {
        Self {
            id: movie.id,
            name: movie.name,
            director: movie.director,
            imdb_score: movie.imdb_score,
            popularity: movie.popularity,
            genre: movie.genres.into_iter().map(|g| g.name).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
}

impl From<&Account> for AccountDto {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            is_staff: account.is_staff,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountDto,
}
