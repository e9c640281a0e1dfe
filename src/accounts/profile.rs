use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::db::AccountChanges;
use crate::validation::{self, FieldErrors, NON_FIELD_ERRORS};

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const PERSON_NAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const NEW_PASSWORD_MIN_LENGTH: usize = 8;

static USERNAME_PATTERN: OnceLock<Regex> = OnceLock::new();
static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn username_pattern() -> &'static Regex {
    USERNAME_PATTERN.get_or_init(|| Regex::new(r"^[\w.@+-]+$").unwrap())
}

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").unwrap())
}

pub fn username_taken() -> &'static str {
    "A user with that username already exists."
}

fn check_username(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    let username = validation::check_text(errors, "username", raw, USERNAME_MAX_LENGTH)?;
    if !username_pattern().is_match(&username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
        return None;
    }
    Some(username)
}

fn check_email(errors: &mut FieldErrors, raw: &str) -> Option<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Some(String::new());
    }
    if email.chars().count() > EMAIL_MAX_LENGTH {
        errors.add("email", validation::max_length(EMAIL_MAX_LENGTH));
        return None;
    }
    if !email_pattern().is_match(email) {
        errors.add("email", "Enter a valid email address.");
        return None;
    }
    Some(email.to_string())
}

fn check_person_name(errors: &mut FieldErrors, field: &str, raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.chars().count() > PERSON_NAME_MAX_LENGTH {
        errors.add(field, validation::max_length(PERSON_NAME_MAX_LENGTH));
        return None;
    }
    Some(name.to_string())
}

/// Stored passwords are trimmed like every other text field, and the length
/// limits apply to the trimmed value. Login compares the raw input.
fn check_password(errors: &mut FieldErrors, field: &str, raw: Option<&str>, min: usize) -> Option<String> {
    let Some(password) = raw.map(str::trim) else {
        errors.add(field, validation::required());
        return None;
    };
    if password.is_empty() {
        errors.add(field, validation::not_blank());
        return None;
    }
    let length = password.chars().count();
    if length > PASSWORD_MAX_LENGTH {
        errors.add(field, validation::max_length(PASSWORD_MAX_LENGTH));
        return None;
    }
    if length < min {
        errors.add(field, validation::min_length(min));
        return None;
    }
    Some(password.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationInput {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// A validated registration. The password is still plain text.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegistrationInput {
    pub fn validate(self) -> Result<Registration, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = check_username(&mut errors, self.username.as_deref());
        let password = check_password(&mut errors, "password", self.password.as_deref(), 1);
        let email = check_email(&mut errors, &self.email);
        let first_name = check_person_name(&mut errors, "first_name", &self.first_name);
        let last_name = check_person_name(&mut errors, "last_name", &self.last_name);

        match (username, password, email, first_name, last_name) {
            (Some(username), Some(password), Some(email), Some(first_name), Some(last_name)) => {
                Ok(Registration {
                    username,
                    password,
                    email,
                    first_name,
                    last_name,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Body of an account self-service update. Every member is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<Value>,
}

impl ProfileUpdate {
    pub fn into_changes(self) -> Result<AccountChanges, FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.password.is_some() {
            errors.add(NON_FIELD_ERRORS, "Password update is not allowed");
            return Err(errors);
        }

        let changes = AccountChanges {
            username: self
                .username
                .as_deref()
                .and_then(|raw| check_username(&mut errors, Some(raw))),
            email: self.email.as_deref().and_then(|raw| check_email(&mut errors, raw)),
            first_name: self
                .first_name
                .as_deref()
                .and_then(|raw| check_person_name(&mut errors, "first_name", raw)),
            last_name: self
                .last_name
                .as_deref()
                .and_then(|raw| check_person_name(&mut errors, "last_name", raw)),
        };

        errors.into_result(changes)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChange {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

impl PasswordChange {
    /// Returns `(old_password, new_password)`.
    pub fn validate(self) -> Result<(String, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let old = check_password(&mut errors, "old_password", self.old_password.as_deref(), 1);
        let new = check_password(
            &mut errors,
            "new_password",
            self.new_password.as_deref(),
            NEW_PASSWORD_MIN_LENGTH,
        );
        match (old, new) {
            (Some(old), Some(new)) => Ok((old, new)),
            _ => Err(errors),
        }
    }
}
