use async_trait::async_trait;

use super::model::*;
use crate::catalog::MovieFilter;

#[async_trait]
pub trait GenreRepo: Send + Sync {
    /// Returns the genre and whether it was inserted by this call.
    async fn get_or_create_genre(&self, name: &str) -> DbResult<(Genre, bool)>;
    async fn list_genres(&self) -> DbResult<Vec<Genre>>;
}

#[async_trait]
pub trait MovieRepo: Send + Sync {
    async fn get_movie(&self, id: i64) -> DbResult<Movie>;
    async fn find_movie(&self, name: &str, director: &str) -> DbResult<Option<Movie>>;
    async fn create_movie(&self, movie: &NewMovie, genres: &[Genre]) -> DbResult<Movie>;
    /// Overwrites the supplied columns and adds `genres` to the existing set.
    async fn update_movie(&self, id: i64, changes: &MovieChanges, genres: &[Genre]) -> DbResult<Movie>;
    async fn delete_movie(&self, id: i64) -> DbResult<()>;
    async fn search_movies(&self, filter: &MovieFilter) -> DbResult<Vec<Movie>>;
}

#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn get_account(&self, id: i64) -> DbResult<Account>;
    async fn get_account_by_username(&self, username: &str) -> DbResult<Account>;
    async fn create_account(&self, account: &NewAccount) -> DbResult<Account>;
    async fn update_account(&self, id: i64, changes: &AccountChanges) -> DbResult<Account>;
    async fn set_password(&self, id: i64, password_hash: &str) -> DbResult<()>;
    async fn set_last_login(&self, id: i64) -> DbResult<()>;
    /// Soft delete: the row stays, `is_active` becomes false.
    async fn deactivate_account(&self, id: i64) -> DbResult<()>;
}

#[async_trait]
pub trait AccessTokenRepo: Send + Sync {
    async fn get_token(&self, token_hash: &str) -> DbResult<AccessToken>;
    async fn insert_token(&self, token: &AccessToken) -> DbResult<()>;
    async fn delete_token(&self, token_hash: &str) -> DbResult<()>;
    async fn delete_tokens_by_account(&self, account_id: i64) -> DbResult<()>;
}
