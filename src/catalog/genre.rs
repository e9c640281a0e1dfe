//! Genre intake and get-or-create resolution.
//!
//! Genre names arrive as raw JSON values inside a movie body. Each one is
//! coerced to a trimmed string and then looked up in the registry; a name
//! that is not registered yet is inserted on the spot. Resolution never
//! rejects an unknown name.

use serde_json::Value;
use tracing::debug;

use crate::db::{DbResult, Genre, GenreRepo};
use crate::validation;

pub const GENRE_NAME_MAX_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenreNameError {
    /// The value has a structural type that cannot become a name.
    #[error("Incorrect type. Expected pk value, received {0}.")]
    TypeConversion(&'static str),
    #[error("This field may not be blank.")]
    Blank,
    #[error("Ensure this field has no more than {GENRE_NAME_MAX_LENGTH} characters.")]
    TooLong,
}

/// A validated, trimmed genre name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenreName(String);

impl GenreName {
    pub fn parse(raw: &Value) -> Result<Self, GenreNameError> {
        let text = match raw {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => return Err(GenreNameError::TypeConversion(json_type_name(other))),
        };

        let name = text.trim();
        if name.is_empty() {
            return Err(GenreNameError::Blank);
        }
        if name.chars().count() > GENRE_NAME_MAX_LENGTH {
            return Err(GenreNameError::TooLong);
        }
        Ok(GenreName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GenreName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Parse the `genre` member of a movie body.
///
/// Names that trim to the same string are collapsed, keeping the first
/// occurrence. All element errors are reported, not just the first.
pub fn parse_genre_list(raw: &Value) -> Result<Vec<GenreName>, Vec<String>> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Null => return Err(vec![validation::not_null().to_string()]),
        other => {
            return Err(vec![format!(
                "Expected a list of items but got type \"{}\".",
                json_type_name(other)
            )])
        }
    };

    let mut names: Vec<GenreName> = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for item in items {
        match GenreName::parse(item) {
            Ok(name) => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    if errors.is_empty() {
        Ok(names)
    } else {
        Err(errors)
    }
}

/// Resolve each name to a registry entry, inserting the ones that are missing.
pub async fn resolve_genres(repo: &dyn GenreRepo, names: &[GenreName]) -> DbResult<Vec<Genre>> {
    let mut genres = Vec::with_capacity(names.len());
    for name in names {
        let (genre, created) = repo.get_or_create_genre(name.as_str()).await?;
        if created {
            debug!(genre = %name, "registered new genre");
        }
        genres.push(genre);
    }
    Ok(genres)
}
