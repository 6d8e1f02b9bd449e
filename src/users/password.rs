//! Argon2 password hashing.
//!
//! Hashes are PHC strings with a fresh 16-byte salt per call. Both operations
//! are CPU bound and run on the blocking pool.

use argon2::{
    Argon2,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use std::sync::OnceLock;

use super::StoreError;

fn hash_blocking(password: &str) -> Result<String, StoreError> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|err| StoreError::Hash(err.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|err| StoreError::Hash(err.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| StoreError::Hash(err.to_string()))
}

/// `Ok(false)` only for a well-formed hash that does not match. An unreadable or
/// foreign hash is a storage fault, not a wrong password.
fn verify_blocking(hash: &str, password: &str) -> Result<bool, StoreError> {
    let parsed = PasswordHash::new(hash).map_err(|err| StoreError::Hash(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(StoreError::Hash(err.to_string())),
    }
}

// Hash used to spend the same work on unknown usernames as on real ones.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_blocking("ttb-auth-timing-equalizer").ok())
        .as_deref()
}

pub(super) async fn hash_password(password: SecretString) -> Result<String, StoreError> {
    tokio::task::spawn_blocking(move || hash_blocking(password.expose_secret()))
        .await
        .map_err(|err| StoreError::Hash(err.to_string()))?
}

pub(super) async fn verify_password(
    hash: String,
    password: String,
) -> Result<bool, StoreError> {
    tokio::task::spawn_blocking(move || verify_blocking(&hash, &password))
        .await
        .map_err(|err| StoreError::Hash(err.to_string()))?
}

/// Run a verification that always fails, so a missing username costs as much as a wrong password.
pub(super) async fn verify_unknown(password: String) {
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = dummy_hash() {
            let _ = verify_blocking(hash, &password);
        }
    })
    .await;
}
