use std::collections::BTreeMap;

use serde::Serialize;

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Validation messages keyed by the request field they refer to.
///
/// Serializes as `{"field": ["message", ...]}`, which is the body of every
/// 400 response the API produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(|v| v.as_slice())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

pub fn required() -> &'static str {
    "This field is required."
}

pub fn not_null() -> &'static str {
    "This field may not be null."
}

pub fn not_blank() -> &'static str {
    "This field may not be blank."
}

pub fn max_length(limit: usize) -> String {
    format!("Ensure this field has no more than {} characters.", limit)
}

pub fn min_length(limit: usize) -> String {
    format!("Ensure this field has at least {} characters.", limit)
}

pub fn max_value(limit: f64) -> String {
    format!("Ensure this value is less than or equal to {:?}.", limit)
}

pub fn min_value(limit: f64) -> String {
    format!("Ensure this value is greater than or equal to {:?}.", limit)
}

/// Validate a required, non-blank text field of bounded length.
///
/// Returns the trimmed value when valid. Errors are recorded under `field`.
pub fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    limit: usize,
) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, required());
        return None;
    };
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, not_blank());
        return None;
    }
    if value.chars().count() > limit {
        errors.add(field, max_length(limit));
        return None;
    }
    Some(value.to_string())
}

/// Validate an optional number against an inclusive range.
pub fn check_range(errors: &mut FieldErrors, field: &str, value: f64, min: f64, max: f64) -> bool {
    if !value.is_finite() {
        errors.add(field, "A valid number is required.");
        return false;
    }
    if value < min {
        errors.add(field, min_value(min));
        return false;
    }
    if value > max {
        errors.add(field, max_value(max));
        return false;
    }
    true
}
