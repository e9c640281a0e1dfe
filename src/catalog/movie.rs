use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::genre::{parse_genre_list, GenreName};
use crate::db::{MovieChanges, NewMovie};
use crate::validation::{self, FieldErrors};

pub const NAME_MAX_LENGTH: usize = 255;
pub const DIRECTOR_MAX_LENGTH: usize = 50;
pub const IMDB_SCORE_RANGE: (f64, f64) = (1.0, 10.0);
pub const POPULARITY_RANGE: (f64, f64) = (0.0, 99.0);

/// Body of a movie create or update request.
///
/// Every member is kept as raw JSON so type errors are reported against the
/// field that caused them. An absent member is `None`; an explicit `null` is
/// `Some(Value::Null)`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieInput {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub director: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub imdb_score: Option<Value>,
    #[serde(default, alias = "99popularity", deserialize_with = "present")]
    pub popularity: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub genre: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn text_field(errors: &mut FieldErrors, field: &str, raw: &Value, limit: usize) -> Option<String> {
    let text = match raw {
        Value::Null => {
            errors.add(field, validation::not_null());
            return None;
        }
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => {
            errors.add(field, "Not a valid string.");
            return None;
        }
    };
    validation::check_text(errors, field, Some(&text), limit)
}

/// `Some(None)` for an explicit null, `None` when invalid.
fn score_field(errors: &mut FieldErrors, field: &str, raw: &Value, range: (f64, f64)) -> Option<Option<f64>> {
    let value = match raw {
        Value::Null => return Some(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(value) = value else {
        errors.add(field, "A valid number is required.");
        return None;
    };
    if validation::check_range(errors, field, value, range.0, range.1) {
        Some(Some(value))
    } else {
        None
    }
}

fn genre_field(errors: &mut FieldErrors, raw: Option<&Value>) -> Vec<GenreName> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match parse_genre_list(raw) {
        Ok(names) => names,
        Err(messages) => {
            for message in messages {
                errors.add("genre", message);
            }
            Vec::new()
        }
    }
}

impl MovieInput {
    /// Validate a create request. `name` and `director` are required.
    pub fn into_new_movie(self) -> Result<(NewMovie, Vec<GenreName>), FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = match self.name {
            Some(ref raw) => text_field(&mut errors, "name", raw, NAME_MAX_LENGTH),
            None => {
                errors.add("name", validation::required());
                None
            }
        };
        let director = match self.director {
            Some(ref raw) => text_field(&mut errors, "director", raw, DIRECTOR_MAX_LENGTH),
            None => {
                errors.add("director", validation::required());
                None
            }
        };
        let imdb_score = self
            .imdb_score
            .as_ref()
            .and_then(|raw| score_field(&mut errors, "imdb_score", raw, IMDB_SCORE_RANGE));
        let popularity = self
            .popularity
            .as_ref()
            .and_then(|raw| score_field(&mut errors, "popularity", raw, POPULARITY_RANGE));
        let genres = genre_field(&mut errors, self.genre.as_ref());

        match (name, director) {
            (Some(name), Some(director)) if errors.is_empty() => Ok((
                NewMovie {
                    name,
                    director,
                    imdb_score: imdb_score.flatten(),
                    popularity: popularity.flatten(),
                },
                genres,
            )),
            _ => Err(errors),
        }
    }

    /// Validate a partial update. Only the members present in the body are
    /// checked and carried into the changes.
    pub fn into_changes(self) -> Result<(MovieChanges, Vec<GenreName>), FieldErrors> {
        let mut errors = FieldErrors::new();

        let changes = MovieChanges {
            name: self
                .name
                .as_ref()
                .and_then(|raw| text_field(&mut errors, "name", raw, NAME_MAX_LENGTH)),
            director: self
                .director
                .as_ref()
                .and_then(|raw| text_field(&mut errors, "director", raw, DIRECTOR_MAX_LENGTH)),
            imdb_score: self
                .imdb_score
                .as_ref()
                .and_then(|raw| score_field(&mut errors, "imdb_score", raw, IMDB_SCORE_RANGE)),
            popularity: self
                .popularity
                .as_ref()
                .and_then(|raw| score_field(&mut errors, "popularity", raw, POPULARITY_RANGE)),
        };
        let genres = genre_field(&mut errors, self.genre.as_ref());

        errors.into_result((changes, genres))
    }
}

/// Message reported when (name, director) collides with another movie.
pub fn unique_together_message() -> &'static str {
    "The fields name, director must make a unique set."
}
