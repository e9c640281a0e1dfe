use crate::util::QueryParams;
use crate::validation::FieldErrors;

/// Conjunctive movie search. Every `None` member matches everything.
///
/// Text members match case-insensitively: `name` and `director` as
/// substrings, `genre` as a whole genre name. Numeric bounds are inclusive
/// and never match a movie whose value is unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieFilter {
    pub name: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub min_popularity: Option<f64>,
    pub max_popularity: Option<f64>,
    pub min_imdb_score: Option<f64>,
    pub max_imdb_score: Option<f64>,
}

impl MovieFilter {
    /// Build a filter from query parameters. Unknown parameters are ignored.
    pub fn from_params(params: &QueryParams) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let mut number = |keys: &[&str]| -> Option<f64> {
            let (key, raw) = params.get_any(keys)?;
            match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Some(value),
                _ => {
                    errors.add(key, "Enter a number.");
                    None
                }
            }
        };

        let text = |key: &str| params.get(key).map(|v| v.trim().to_string());

        let filter = MovieFilter {
            name: text("name"),
            director: text("director"),
            genre: text("genre"),
            min_popularity: number(&["min_popularity", "min_99popularity"]),
            max_popularity: number(&["max_popularity", "max_99popularity"]),
            min_imdb_score: number(&["min_imdb_score"]),
            max_imdb_score: number(&["max_imdb_score"]),
        };

        errors.into_result(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_no_params_is_empty_filter() {
        let filter = MovieFilter::from_params(&params(&[])).unwrap();
        assert_eq!(filter, MovieFilter::default());
    }

    #[test]
    fn test_unknown_and_empty_params_are_ignored() {
        let filter =
            MovieFilter::from_params(&params(&[("year", "1952"), ("name", ""), ("director", "  ")]))
                .unwrap();
        assert_eq!(filter, MovieFilter::default());
    }

    #[test]
    fn test_text_params_are_trimmed() {
        let filter = MovieFilter::from_params(&params(&[
            ("name", " singin "),
            ("director", " donen"),
            ("genre", "musical "),
        ]))
        .unwrap();
        assert_eq!(filter.name.as_deref(), Some("singin"));
        assert_eq!(filter.director.as_deref(), Some("donen"));
        assert_eq!(filter.genre.as_deref(), Some("musical"));
    }

    #[test]
    fn test_all_params() {
        let filter = MovieFilter::from_params(&params(&[
            ("name", "the"),
            ("director", "ivan"),
            ("genre", "romance"),
            ("min_99popularity", "70"),
            ("max_popularity", "80"),
            ("min_imdb_score", "7"),
            ("max_imdb_score", "8.5"),
        ]))
        .unwrap();

        assert_eq!(
            filter,
            MovieFilter {
                name: Some("the".to_string()),
                director: Some("ivan".to_string()),
                genre: Some("romance".to_string()),
                min_popularity: Some(70.0),
                max_popularity: Some(80.0),
                min_imdb_score: Some(7.0),
                max_imdb_score: Some(8.5),
            }
        );
    }

    #[test]
    fn test_bad_numbers_are_reported_per_param() {
        let errors = MovieFilter::from_params(&params(&[
            ("min_imdb_score", "eight"),
            ("max_99popularity", "NaN"),
        ]))
        .unwrap_err();
        assert_eq!(errors.get("min_imdb_score").unwrap(), &["Enter a number.".to_string()]);
        assert_eq!(errors.get("max_99popularity").unwrap(), &["Enter a number.".to_string()]);
    }
}
