//! Read-only account listing.

use std::sync::Arc;
use tracing::error;

use crate::users::{AccountSummary, CredentialStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable")]
    Operational(#[from] StoreError),
}

#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn CredentialStore>,
}

impl DirectoryService {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Every account (active or not) as `(id, username)`, ordered by username.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Operational`] when storage cannot be read.
    pub async fn list(&self) -> Result<Vec<AccountSummary>, DirectoryError> {
        self.store.list().await.map_err(|err| {
            error!("failed to list users: {err}");
            DirectoryError::Operational(err)
        })
    }
}
