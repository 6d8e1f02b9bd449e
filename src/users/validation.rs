//! Account form validation.
//!
//! Every check runs; the caller gets the full list of problems at once.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{CredentialStore, StoreError};

pub const NO_USERNAME: &str = "no username specified";
pub const USERNAME_EXISTS: &str = "that username already exists";
pub const NO_EMAIL: &str = "no email specified";
pub const EMPTY_PASSWORD: &str = "empty password";
pub const PASSWORD_MISMATCH: &str = "the passwords don't match";

/// Submitted add/edit form.
#[derive(Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
    /// `true`/`false`; absent keeps the current flag on edit.
    #[serde(default)]
    pub active: Option<String>,
}

impl std::fmt::Debug for UserForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserForm")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"***")
            .field("password2", &"***")
            .field("active", &self.active)
            .finish()
    }
}

impl UserForm {
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.trim()
    }

    #[must_use]
    pub fn email(&self) -> &str {
        self.email.trim()
    }

    #[must_use]
    pub fn phone(&self) -> &str {
        self.phone.trim()
    }

    /// Parsed `active` field; `None` when absent or unrecognized.
    #[must_use]
    pub fn active(&self) -> Option<bool> {
        match self.active.as_deref().map(str::trim) {
            Some("true" | "on" | "1") => Some(true),
            Some("false" | "off" | "0") => Some(false),
            _ => None,
        }
    }
}

/// Validate a form, consulting the store for username uniqueness.
///
/// `excluding` is the account being edited, so it may keep its own username.
///
/// # Errors
/// Returns an error only when the uniqueness check cannot reach storage.
pub async fn validate(
    form: &UserForm,
    store: &dyn CredentialStore,
    excluding: Option<Uuid>,
) -> Result<Vec<String>, StoreError> {
    let mut errors = Vec::new();

    let username = form.username();
    if username.is_empty() {
        errors.push(NO_USERNAME.to_string());
    } else if store.username_exists(username, excluding).await? {
        errors.push(USERNAME_EXISTS.to_string());
    }

    if form.email().is_empty() {
        errors.push(NO_EMAIL.to_string());
    }

    if form.password.is_empty() {
        errors.push(EMPTY_PASSWORD.to_string());
    }
    if form.password != form.password2 {
        errors.push(PASSWORD_MISMATCH.to_string());
    }

    Ok(errors)
}
