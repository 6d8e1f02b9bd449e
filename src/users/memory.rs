//! In-process credential store.
//!
//! Used by tests and local runs without Postgres. Writes take the map's write
//! lock, so the username check and the insert happen atomically.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Account, AccountSummary, AccountWrite, CredentialStore, StoreError, VerifyOutcome, password,
};

struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, StoredAccount>>,
    offline: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a storage outage: every call fails with a persistence error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Store an account with a raw password hash, bypassing hashing.
    #[cfg(test)]
    pub(crate) async fn insert_with_hash(&self, account: Account, password_hash: String) {
        self.accounts.write().await.insert(
            account.id,
            StoredAccount {
                account,
                password_hash,
            },
        );
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn username_taken(
    accounts: &HashMap<Uuid, StoredAccount>,
    username: &str,
    excluding: Option<Uuid>,
) -> bool {
    accounts
        .values()
        .any(|stored| stored.account.username == username && Some(stored.account.id) != excluding)
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn write(&self, write: AccountWrite) -> Result<Account, StoreError> {
        self.check_online()?;
        let password_hash = password::hash_password(write.password).await?;

        let mut accounts = self.accounts.write().await;
        if username_taken(&accounts, &write.username, write.id) {
            return Err(StoreError::UsernameTaken);
        }

        let (id, created_at) = match write.id {
            Some(id) => {
                let existing = accounts.get(&id).ok_or(StoreError::NotFound(id))?;
                (id, existing.account.created_at)
            }
            None => (Uuid::new_v4(), Utc::now()),
        };

        let account = Account {
            id,
            username: write.username,
            email: write.email,
            phone: write.phone,
            token: Uuid::new_v4(),
            active: write.active,
            created_at,
        };
        accounts.insert(
            id,
            StoredAccount {
                account: account.clone(),
                password_hash,
            },
        );
        Ok(account)
    }

    async fn username_exists(
        &self,
        username: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        let accounts = self.accounts.read().await;
        Ok(username_taken(&accounts, username, excluding))
    }

    async fn find_by_identity(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.check_online()?;
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&id).map(|stored| stored.account.clone()))
    }

    async fn verify(&self, username: &str, password: &str) -> Result<VerifyOutcome, StoreError> {
        self.check_online()?;
        let found = {
            let accounts = self.accounts.read().await;
            accounts
                .values()
                .find(|stored| stored.account.username == username)
                .map(|stored| (stored.account.clone(), stored.password_hash.clone()))
        };

        let Some((account, hash)) = found else {
            password::verify_unknown(password.to_string()).await;
            return Ok(VerifyOutcome::UnknownUsername);
        };

        if password::verify_password(hash, password.to_string()).await? {
            Ok(VerifyOutcome::Matched(account))
        } else {
            Ok(VerifyOutcome::HashMismatch)
        }
    }

    async fn list(&self) -> Result<Vec<AccountSummary>, StoreError> {
        self.check_online()?;
        let accounts = self.accounts.read().await;
        let mut list: Vec<AccountSummary> = accounts
            .values()
            .map(|stored| AccountSummary {
                id: stored.account.id,
                username: stored.account.username.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(list)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }
}
