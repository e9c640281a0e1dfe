use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use super::model::*;
use super::repo::*;
use crate::catalog::MovieFilter;

const MOVIE_COLUMNS: &str = "SELECT id, name, director, imdb_score, popularity FROM movies";

const ACCOUNT_COLUMNS: &str = "SELECT id, username, email, first_name, last_name, password, \
     is_staff, is_active, date_joined, last_login FROM accounts";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(db_path: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is a separate database,
        // so keep exactly one alive for the lifetime of the pool.
        let in_memory = db_path.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        let repo = Self { pool };
        repo.init_schema().await?;

        info!("Database initialized at {}", db_path);

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Search key for case-insensitive matching. Stored beside the original
/// text at write time, since SQLite's `lower()` only folds ASCII.
fn fold(text: &str) -> String {
    text.to_lowercase()
}

async fn insert_genre(conn: &mut SqliteConnection, name: &str) -> DbResult<(Genre, bool)> {
    let result = sqlx::query(
        "INSERT INTO genres (name, folded) VALUES (?, ?) ON CONFLICT (name) DO NOTHING",
    )
    .bind(name)
    .bind(fold(name))
    .execute(&mut *conn)
    .await?;

    let created = result.rows_affected() == 1;
    if created {
        debug!(genre = name, "created genre");
    }
    Ok((Genre { name: name.to_string() }, created))
}

/// Add links from a movie to each genre. Links that already exist are kept.
async fn link_genres(conn: &mut SqliteConnection, movie_id: i64, genres: &[Genre]) -> DbResult<()> {
    for genre in genres {
        insert_genre(conn, &genre.name).await?;
        sqlx::query(
            "INSERT INTO movie_genres (movie_id, genre_name) VALUES (?, ?)
             ON CONFLICT (movie_id, genre_name) DO NOTHING",
        )
        .bind(movie_id)
        .bind(&genre.name)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load_genres(conn: &mut SqliteConnection, movie_id: i64) -> DbResult<Vec<Genre>> {
    let genres = sqlx::query_as::<_, Genre>(
        "SELECT genre_name AS name FROM movie_genres WHERE movie_id = ? ORDER BY genre_name",
    )
    .bind(movie_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(genres)
}

async fn load_movie(conn: &mut SqliteConnection, id: i64) -> DbResult<Movie> {
    let row = sqlx::query_as::<_, MovieRow>(&format!("{} WHERE id = ?", MOVIE_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Movie not found: {}", id)))?;

    let genres = load_genres(conn, id).await?;
    Ok(row.into_movie(genres))
}

/// Genre links of every movie matching `filter`, keyed by movie id.
///
/// The filter is repeated here rather than binding the matched ids, so the
/// number of bound parameters does not grow with the result set.
async fn load_links(
    conn: &mut SqliteConnection,
    filter: &MovieFilter,
) -> DbResult<HashMap<i64, Vec<Genre>>> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT links.movie_id, links.genre_name FROM movie_genres links \
         JOIN movies ON movies.id = links.movie_id",
    );
    push_filter(&mut query, filter);
    query.push(" ORDER BY links.genre_name");

    let links = query
        .build_query_as::<(i64, String)>()
        .fetch_all(&mut *conn)
        .await?;

    let mut by_movie: HashMap<i64, Vec<Genre>> = HashMap::new();
    for (movie_id, name) in links {
        by_movie.entry(movie_id).or_default().push(Genre { name });
    }
    Ok(by_movie)
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &MovieFilter) {
    query.push(" WHERE 1 = 1");

    if let Some(ref name) = filter.name {
        query
            .push(" AND instr(movies.name_folded, ")
            .push_bind(fold(name))
            .push(") > 0");
    }
    if let Some(ref director) = filter.director {
        query
            .push(" AND instr(movies.director_folded, ")
            .push_bind(fold(director))
            .push(") > 0");
    }
    if let Some(ref genre) = filter.genre {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM movie_genres mg JOIN genres g ON g.name = mg.genre_name \
                 WHERE mg.movie_id = movies.id AND g.folded = ",
            )
            .push_bind(fold(genre))
            .push(")");
    }
    if let Some(min) = filter.min_popularity {
        query.push(" AND movies.popularity >= ").push_bind(min);
    }
    if let Some(max) = filter.max_popularity {
        query.push(" AND movies.popularity <= ").push_bind(max);
    }
    if let Some(min) = filter.min_imdb_score {
        query.push(" AND movies.imdb_score >= ").push_bind(min);
    }
    if let Some(max) = filter.max_imdb_score {
        query.push(" AND movies.imdb_score <= ").push_bind(max);
    }
}

#[async_trait]
impl GenreRepo for SqliteRepository {
    async fn get_or_create_genre(&self, name: &str) -> DbResult<(Genre, bool)> {
        let mut conn = self.pool.acquire().await?;
        insert_genre(&mut conn, name).await
    }

    async fn list_genres(&self) -> DbResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT name FROM genres ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(genres)
    }
}

#[async_trait]
impl MovieRepo for SqliteRepository {
    async fn get_movie(&self, id: i64) -> DbResult<Movie> {
        let mut conn = self.pool.acquire().await?;
        load_movie(&mut conn, id).await
    }

    async fn find_movie(&self, name: &str, director: &str) -> DbResult<Option<Movie>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "{} WHERE name = ? AND director = ?",
            MOVIE_COLUMNS
        ))
        .bind(name)
        .bind(director)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let genres = load_genres(&mut conn, row.id).await?;
                Ok(Some(row.into_movie(genres)))
            }
            None => Ok(None),
        }
    }

    async fn create_movie(&self, movie: &NewMovie, genres: &[Genre]) -> DbResult<Movie> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO movies (name, director, name_folded, director_folded, imdb_score, popularity) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&movie.name)
        .bind(&movie.director)
        .bind(fold(&movie.name))
        .bind(fold(&movie.director))
        .bind(movie.imdb_score)
        .bind(movie.popularity)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DbError::from_write(e, || format!("Movie {} by {}", movie.name, movie.director))
        })?
        .last_insert_rowid();

        link_genres(&mut tx, id, genres).await?;
        let created = load_movie(&mut tx, id).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_movie(&self, id: i64, changes: &MovieChanges, genres: &[Genre]) -> DbResult<Movie> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i64>("SELECT id FROM movies WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Movie not found: {}", id)))?;

        if !changes.is_empty() {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE movies SET ");
            let mut columns = query.separated(", ");
            if let Some(ref name) = changes.name {
                columns.push("name = ").push_bind_unseparated(name.clone());
                columns.push("name_folded = ").push_bind_unseparated(fold(name));
            }
            if let Some(ref director) = changes.director {
                columns.push("director = ").push_bind_unseparated(director.clone());
                columns.push("director_folded = ").push_bind_unseparated(fold(director));
            }
            if let Some(imdb_score) = changes.imdb_score {
                columns.push("imdb_score = ").push_bind_unseparated(imdb_score);
            }
            if let Some(popularity) = changes.popularity {
                columns.push("popularity = ").push_bind_unseparated(popularity);
            }
            query.push(" WHERE id = ").push_bind(id);

            query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| DbError::from_write(e, || format!("Movie {}", id)))?;
        }

        link_genres(&mut tx, id, genres).await?;
        let updated = load_movie(&mut tx, id).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_movie(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Movie not found: {}", id)));
        }
        Ok(())
    }

    async fn search_movies(&self, filter: &MovieFilter) -> DbResult<Vec<Movie>> {
        // Rows and links are read in one transaction so they agree.
        let mut tx = self.pool.begin().await?;

        let mut query = QueryBuilder::<Sqlite>::new(MOVIE_COLUMNS);
        push_filter(&mut query, filter);
        query.push(" ORDER BY movies.id");

        let rows = query
            .build_query_as::<MovieRow>()
            .fetch_all(&mut *tx)
            .await?;
        let mut links = load_links(&mut tx, filter).await?;
        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let genres = links.remove(&row.id).unwrap_or_default();
                row.into_movie(genres)
            })
            .collect())
    }
}

#[async_trait]
impl AccountRepo for SqliteRepository {
    async fn get_account(&self, id: i64) -> DbResult<Account> {
        sqlx::query_as::<_, Account>(&format!("{} WHERE id = ?", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::NotFound(format!("Account not found: {}", id)),
                _ => DbError::Sqlx(e),
            })
    }

    async fn get_account_by_username(&self, username: &str) -> DbResult<Account> {
        sqlx::query_as::<_, Account>(&format!("{} WHERE username = ?", ACCOUNT_COLUMNS))
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    DbError::NotFound(format!("Account not found: {}", username))
                }
                _ => DbError::Sqlx(e),
            })
    }

    async fn create_account(&self, account: &NewAccount) -> DbResult<Account> {
        let id = sqlx::query(
            "INSERT INTO accounts
            (username, email, first_name, last_name, password, is_staff, is_active, date_joined)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.password)
        .bind(account.is_staff)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, || format!("Account {}", account.username)))?
        .last_insert_rowid();

        self.get_account(id).await
    }

    async fn update_account(&self, id: i64, changes: &AccountChanges) -> DbResult<Account> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE accounts SET ");
        let mut columns = query.separated(", ");
        let mut any = false;
        for (column, value) in [
            ("username", &changes.username),
            ("email", &changes.email),
            ("first_name", &changes.first_name),
            ("last_name", &changes.last_name),
        ] {
            if let Some(value) = value {
                columns.push(format!("{} = ", column)).push_bind_unseparated(value.clone());
                any = true;
            }
        }

        if any {
            query.push(" WHERE id = ").push_bind(id);
            let result = query
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| DbError::from_write(e, || format!("Account {}", id)))?;
            if result.rows_affected() == 0 {
                return Err(DbError::NotFound(format!("Account not found: {}", id)));
            }
        }

        self.get_account(id).await
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> DbResult<()> {
        sqlx::query("UPDATE accounts SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_last_login(&self, id: i64) -> DbResult<()> {
        sqlx::query("UPDATE accounts SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate_account(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE accounts SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Account not found: {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AccessTokenRepo for SqliteRepository {
    async fn get_token(&self, token_hash: &str) -> DbResult<AccessToken> {
        sqlx::query_as::<_, AccessToken>(
            "SELECT token_hash, account_id, created FROM access_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => DbError::NotFound("Token not found".to_string()),
            _ => DbError::Sqlx(e),
        })
    }

    async fn insert_token(&self, token: &AccessToken) -> DbResult<()> {
        sqlx::query("INSERT INTO access_tokens (token_hash, account_id, created) VALUES (?, ?, ?)")
            .bind(&token.token_hash)
            .bind(token.account_id)
            .bind(token.created)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_token(&self, token_hash: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_tokens_by_account(&self, account_id: i64) -> DbResult<()> {
        sqlx::query("DELETE FROM access_tokens WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
