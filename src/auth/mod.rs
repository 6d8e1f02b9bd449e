//! Credential verification with failure classification.
//!
//! The [`Authenticator`] is the single answer to "is this credential valid and
//! which account does it resolve to". Both transports call it and map
//! [`AuthError`] into their own vocabulary.

use std::sync::Arc;
use tracing::{debug, error};

use crate::users::{Account, CredentialStore, StoreError, VerifyOutcome};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown username or wrong password; the two are indistinguishable.
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("User is inactive")]
    UserInactive,
    #[error("credential storage unavailable")]
    Operational(#[source] StoreError),
}

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
}

impl Authenticator {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Resolve `(username, password)` to an active account.
    ///
    /// The password is checked before the active flag, so an inactive account
    /// only reports [`AuthError::UserInactive`] to someone who knows its password.
    ///
    /// # Errors
    /// [`AuthError::AuthenticationFailed`] for bad credentials,
    /// [`AuthError::UserInactive`] for a matched but disabled account, and
    /// [`AuthError::Operational`] when the store cannot answer.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let outcome = self.store.verify(username, password).await.map_err(|err| {
            error!("credential lookup failed: {err}");
            AuthError::Operational(err)
        })?;

        match outcome {
            VerifyOutcome::Matched(account) if account.active => {
                debug!(user.id = %account.id, "credentials accepted");
                Ok(account)
            }
            VerifyOutcome::Matched(account) => {
                debug!(user.id = %account.id, "credentials accepted for inactive account");
                Err(AuthError::UserInactive)
            }
            VerifyOutcome::UnknownUsername | VerifyOutcome::HashMismatch => {
                Err(AuthError::AuthenticationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{AccountWrite, MemoryStore};
    use secrecy::SecretString;

    async fn seeded() -> anyhow::Result<(Arc<MemoryStore>, Authenticator, Account)> {
        let store = Arc::new(MemoryStore::new());
        let sa = store
            .write(
                AccountWrite::new("sa", SecretString::from("s3kr3t"))
                    .with_email("sa@example.com"),
            )
            .await?;
        let authenticator = Authenticator::new(store.clone());
        Ok((store, authenticator, sa))
    }

    #[tokio::test]
    async fn sa_scenario() -> anyhow::Result<()> {
        let (store, authenticator, sa) = seeded().await?;

        let account = authenticator.authenticate("sa", "s3kr3t").await?;
        assert_eq!(account.id, sa.id);

        assert!(matches!(
            authenticator.authenticate("sa", "wrong").await,
            Err(AuthError::AuthenticationFailed)
        ));

        store
            .write(
                AccountWrite::new("sa", SecretString::from("s3kr3t"))
                    .with_id(sa.id)
                    .with_email("sa@example.com")
                    .with_active(false),
            )
            .await?;
        assert!(matches!(
            authenticator.authenticate("sa", "s3kr3t").await,
            Err(AuthError::UserInactive)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn inactive_account_with_wrong_password_is_plain_failure() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        store
            .write(AccountWrite::new("bob", SecretString::from("pw")).with_active(false))
            .await?;
        let authenticator = Authenticator::new(store);
        assert!(matches!(
            authenticator.authenticate("bob", "nope").await,
            Err(AuthError::AuthenticationFailed)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_username_looks_like_wrong_password() -> anyhow::Result<()> {
        let (_store, authenticator, _) = seeded().await?;
        let unknown = authenticator.authenticate("nobody", "s3kr3t").await;
        let wrong = authenticator.authenticate("sa", "nope").await;
        let (Err(unknown), Err(wrong)) = (unknown, wrong) else {
            anyhow::bail!("expected both attempts to fail");
        };
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(unknown, AuthError::AuthenticationFailed));
        Ok(())
    }

    #[tokio::test]
    async fn storage_outage_is_operational_not_bad_credentials() -> anyhow::Result<()> {
        let (store, authenticator, _) = seeded().await?;
        store.set_offline(true);
        assert!(matches!(
            authenticator.authenticate("sa", "s3kr3t").await,
            Err(AuthError::Operational(StoreError::Persistence(_)))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn bcrypt_row_is_operational_not_bad_credentials() {
        let store = Arc::new(MemoryStore::new());
        let legacy = Account {
            id: uuid::Uuid::new_v4(),
            username: "legacy".to_string(),
            email: String::new(),
            phone: String::new(),
            token: uuid::Uuid::new_v4(),
            active: true,
            created_at: chrono::Utc::now(),
        };
        store
            .insert_with_hash(
                legacy,
                "$2a$06$DCq7YPn5Rq63x1Lad4cll.TV4S6ytwfsfvkgY8jIucDrjc8deX1s.".to_string(),
            )
            .await;
        let authenticator = Authenticator::new(store);
        assert!(matches!(
            authenticator.authenticate("legacy", "s3kr3t").await,
            Err(AuthError::Operational(StoreError::Hash(_)))
        ));
    }
}
