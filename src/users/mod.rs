//! Credential store.
//!
//! Accounts live in the `users` table and are only ever reached through the
//! [`CredentialStore`] trait. The store owns password hashing: callers hand it
//! cleartext material on write and on verify, and never see the stored hash.
//!
//! ## Identity and uniqueness
//!
//! - The identity is assigned once on first write and never reused; there is
//!   no deletion path.
//! - Usernames are unique across active and inactive accounts. The uniqueness
//!   rule is enforced by the storage layer itself (a unique constraint for
//!   Postgres, the write lock for the in-memory store) and surfaces as
//!   [`StoreError::UsernameTaken`]. [`CredentialStore::username_exists`] is a
//!   pre-check for form feedback only.
//! - Every write regenerates the account token and re-hashes the password with
//!   a fresh salt.

mod memory;
mod password;
mod postgres;
mod store;
pub mod validation;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{CredentialStore, StoreError, VerifyOutcome};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

/// Username of the bootstrap administrator account.
pub const BOOTSTRAP_USERNAME: &str = "sa";

/// A stored account, without its password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub token: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Directory entry: the public face of an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountSummary {
    pub id: Uuid,
    pub username: String,
}

/// Input for [`CredentialStore::write`].
///
/// `id: None` inserts a new account, `Some(id)` updates the existing one.
#[derive(Clone, Debug)]
pub struct AccountWrite {
    pub id: Option<Uuid>,
    pub username: String,
    pub password: SecretString,
    pub email: String,
    pub phone: String,
    pub active: bool,
}

impl AccountWrite {
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            id: None,
            username: username.into(),
            password,
            email: String::new(),
            phone: String::new(),
            active: true,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Create the bootstrap administrator unless an account with that username exists.
///
/// Returns the created account, or `None` when it was already present.
///
/// # Errors
/// Returns an error if the store cannot be queried or written.
pub async fn seed_bootstrap_account(
    store: &Arc<dyn CredentialStore>,
    password: SecretString,
) -> Result<Option<Account>, StoreError> {
    if store.username_exists(BOOTSTRAP_USERNAME, None).await? {
        return Ok(None);
    }

    info!("creating sysadmin user");
    match store
        .write(AccountWrite::new(BOOTSTRAP_USERNAME, password))
        .await
    {
        Ok(account) => Ok(Some(account)),
        // Another instance won the race; the account exists either way.
        Err(StoreError::UsernameTaken) => Ok(None),
        Err(err) => Err(err),
    }
}
