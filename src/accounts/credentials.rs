use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::profile::Registration;
use crate::db::{AccessToken, AccessTokenRepo, Account, AccountRepo, DbError, NewAccount, SqliteRepository};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Invalid username/password.")]
    InvalidCredentials,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("Password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Accounts, password hashes and access tokens.
///
/// Passwords are bcrypt hashes. Access tokens are random UUIDs handed to
/// the client once; only their SHA-256 digest is stored. Deactivated
/// accounts can neither log in nor use a token issued earlier.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<SqliteRepository>,
    bcrypt_cost: u32,
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl CredentialStore {
    pub fn new(db: Arc<SqliteRepository>, bcrypt_cost: u32) -> Self {
        Self { db, bcrypt_cost }
    }

    async fn hash_password(&self, password: &str) -> Result<String, CredentialError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hash)
    }

    pub async fn check_password(&self, account: &Account, password: &str) -> Result<bool, CredentialError> {
        let password = password.to_string();
        let hash = account.password.clone();
        let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        Ok(ok)
    }

    pub async fn create_account(&self, registration: Registration, is_staff: bool) -> Result<Account, CredentialError> {
        let password = self.hash_password(&registration.password).await?;
        let account = self
            .db
            .create_account(&NewAccount {
                username: registration.username,
                email: registration.email,
                first_name: registration.first_name,
                last_name: registration.last_name,
                password,
                is_staff,
            })
            .await?;

        info!(account = account.id, username = %account.username, staff = is_staff, "account created");
        Ok(account)
    }

    /// Check a username and password pair and record the login.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account, CredentialError> {
        let account = self.verify(username, password).await?;
        self.db.set_last_login(account.id).await?;
        Ok(account)
    }

    /// Check a username and password pair without recording a login. Used for
    /// per-request HTTP Basic credentials.
    pub async fn verify(&self, username: &str, password: &str) -> Result<Account, CredentialError> {
        let account = match self.db.get_account_by_username(username).await {
            Ok(account) => account,
            Err(DbError::NotFound(_)) => {
                warn!(username, "login for unknown account");
                return Err(CredentialError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !account.is_active || !self.check_password(&account, password).await? {
            warn!(username, "rejected login");
            return Err(CredentialError::InvalidCredentials);
        }
        Ok(account)
    }

    pub async fn set_password(&self, account_id: i64, password: &str) -> Result<(), CredentialError> {
        let hash = self.hash_password(password).await?;
        self.db.set_password(account_id, &hash).await?;
        info!(account = account_id, "password changed");
        Ok(())
    }

    /// Mark the account inactive and revoke every token it holds.
    pub async fn deactivate(&self, account_id: i64) -> Result<(), CredentialError> {
        self.db.deactivate_account(account_id).await?;
        self.db.delete_tokens_by_account(account_id).await?;
        info!(account = account_id, "account deactivated");
        Ok(())
    }

    /// Issue a new access token. The plain token is only returned here.
    pub async fn issue_token(&self, account: &Account) -> Result<String, CredentialError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.db
            .insert_token(&AccessToken {
                token_hash: token_digest(&token),
                account_id: account.id,
                created: Utc::now(),
            })
            .await?;
        Ok(token)
    }

    pub async fn resolve_token(&self, token: &str) -> Result<Account, CredentialError> {
        let stored = match self.db.get_token(&token_digest(token)).await {
            Ok(stored) => stored,
            Err(DbError::NotFound(_)) => return Err(CredentialError::InvalidToken),
            Err(e) => return Err(e.into()),
        };

        let account = match self.db.get_account(stored.account_id).await {
            Ok(account) => account,
            Err(DbError::NotFound(_)) => return Err(CredentialError::InvalidToken),
            Err(e) => return Err(e.into()),
        };
        if !account.is_active {
            debug!(account = account.id, "token of inactive account");
            return Err(CredentialError::InvalidToken);
        }
        Ok(account)
    }

    pub async fn revoke_token(&self, token: &str) -> Result<(), CredentialError> {
        self.db.delete_token(&token_digest(token)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> CredentialStore {
        let db = Arc::new(SqliteRepository::new("sqlite::memory:").await.unwrap());
        CredentialStore::new(db, 4)
    }

    fn registration(username: &str, password: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password: password.to_string(),
            email: format!("{}@example.com", username),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn test_token_digest_is_stable_hex() {
        let digest = token_digest("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest("abc"));
        assert_ne!(digest, token_digest("abd"));
    }

    #[tokio::test]
    async fn test_password_is_hashed() {
        let store = store().await;
        let account = store.create_account(registration("tester", "abcd1234"), false).await.unwrap();
        assert_ne!(account.password, "abcd1234");
        assert!(store.check_password(&account, "abcd1234").await.unwrap());
        assert!(!store.check_password(&account, "abcd1235").await.unwrap());
    }

    #[tokio::test]
    async fn test_authenticate_and_set_password() {
        let store = store().await;
        store.create_account(registration("tester", "abcd1234"), false).await.unwrap();

        let account = store.authenticate("tester", "abcd1234").await.unwrap();
        assert!(matches!(
            store.authenticate("tester", "wrong").await,
            Err(CredentialError::InvalidCredentials)
        ));
        assert!(matches!(
            store.authenticate("nobody", "abcd1234").await,
            Err(CredentialError::InvalidCredentials)
        ));

        store.set_password(account.id, "asdf9000").await.unwrap();
        assert!(store.authenticate("tester", "asdf9000").await.is_ok());
        assert!(store.authenticate("tester", "abcd1234").await.is_err());
    }

    #[tokio::test]
    async fn test_verify_does_not_record_login() {
        let store = store().await;
        store.create_account(registration("tester", "abcd1234"), false).await.unwrap();

        let account = store.verify("tester", "abcd1234").await.unwrap();
        assert!(account.last_login.is_none());
        let stored = store.db.get_account_by_username("tester").await.unwrap();
        assert!(stored.last_login.is_none());

        assert!(matches!(
            store.verify("tester", "wrong").await,
            Err(CredentialError::InvalidCredentials)
        ));
        store.authenticate("tester", "abcd1234").await.unwrap();
        let stored = store.db.get_account_by_username("tester").await.unwrap();
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn test_deactivate_blocks_login_and_tokens() {
        let store = store().await;
        let account = store.create_account(registration("tester", "abcd1234"), false).await.unwrap();
        let token = store.issue_token(&account).await.unwrap();
        assert_eq!(store.resolve_token(&token).await.unwrap().id, account.id);

        store.deactivate(account.id).await.unwrap();

        assert!(matches!(
            store.authenticate("tester", "abcd1234").await,
            Err(CredentialError::InvalidCredentials)
        ));
        assert!(matches!(
            store.verify("tester", "abcd1234").await,
            Err(CredentialError::InvalidCredentials)
        ));
        assert!(matches!(
            store.resolve_token(&token).await,
            Err(CredentialError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_is_invalid() {
        let store = store().await;
        let account = store.create_account(registration("tester", "abcd1234"), false).await.unwrap();
        let token = store.issue_token(&account).await.unwrap();
        store.revoke_token(&token).await.unwrap();
        assert!(matches!(
            store.resolve_token(&token).await,
            Err(CredentialError::InvalidToken)
        ));
    }
}
