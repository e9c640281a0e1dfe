//! Movie catalog rules: genre resolution, write validation and search.

pub mod genre;
pub mod movie;
pub mod search;

pub use genre::{parse_genre_list, resolve_genres, GenreName, GenreNameError};
pub use movie::MovieInput;
pub use search::MovieFilter;
