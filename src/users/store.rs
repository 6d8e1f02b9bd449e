use async_trait::async_trait;
use uuid::Uuid;

use super::{Account, AccountSummary, AccountWrite};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("that username already exists")]
    UsernameTaken,
    #[error("account {0} not found")]
    NotFound(Uuid),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("storage failure")]
    Persistence(#[from] sqlx::Error),
}

/// Result of [`CredentialStore::verify`].
///
/// The store only reports what it found; deciding what an inactive account
/// means is left to the authenticator.
#[derive(Debug)]
pub enum VerifyOutcome {
    Matched(Account),
    UnknownUsername,
    HashMismatch,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert (`id: None`) or update an account, hashing the password with a fresh salt
    /// and regenerating the account token.
    async fn write(&self, account: AccountWrite) -> Result<Account, StoreError>;

    /// True if another account (not `excluding`) already uses `username`.
    async fn username_exists(
        &self,
        username: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, StoreError>;

    async fn find_by_identity(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Compare `password` against the stored hash for `username`.
    async fn verify(&self, username: &str, password: &str) -> Result<VerifyOutcome, StoreError>;

    /// Every account, ordered by username.
    async fn list(&self) -> Result<Vec<AccountSummary>, StoreError>;

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
