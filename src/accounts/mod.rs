//! User accounts: the credential store and self-service profile rules.

pub mod credentials;
pub mod profile;

pub use credentials::{CredentialError, CredentialStore};
pub use profile::{PasswordChange, ProfileUpdate, Registration, RegistrationInput};
