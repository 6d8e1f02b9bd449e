//! Web session manager.
//!
//! Sessions live in process memory, keyed by the SHA-256 digest of the opaque
//! token carried in the `ttb-auth` cookie. A session is either anonymous or
//! bound to one identity, and carries one-shot flash messages and at most one
//! echoed form. Each session expires a fixed TTL after its last write.
//!
//! Handlers never touch the store directly: [`middleware::persist_session`]
//! loads the session once per request and writes it back once after the
//! handler returns.

pub(crate) mod cookie;
pub mod middleware;

pub use middleware::{Session, persist_session, require_login};

use serde::Serialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::users::Account;

/// Default idle lifetime of a session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(15 * 60);

/// The identity a session is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionIdentity {
    pub id: Uuid,
    pub username: String,
}

impl From<&Account> for SessionIdentity {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
        }
    }
}

/// Non-secret fields of a rejected add/edit submission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FormEcho {
    pub username: String,
    pub email: String,
    pub phone: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionData {
    identity: Option<SessionIdentity>,
    flashes: Vec<String>,
    form: Option<FormEcho>,
}

impl SessionData {
    #[must_use]
    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    pub fn login(&mut self, identity: SessionIdentity) {
        self.identity = Some(identity);
    }

    pub fn logout(&mut self) {
        self.identity = None;
    }

    pub fn flash(&mut self, message: impl Into<String>) {
        self.flashes.push(message.into());
    }

    /// Pending flashes in the order they were added; they are gone afterwards.
    pub fn take_flashes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.flashes)
    }

    pub fn echo_form(&mut self, form: FormEcho) {
        self.form = Some(form);
    }

    pub fn take_form(&mut self) -> Option<FormEcho> {
        self.form.take()
    }

    /// Anonymous with nothing pending; such a session is not worth storing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identity.is_none() && self.flashes.is_empty() && self.form.is_none()
    }
}

struct Entry {
    data: SessionData,
    expires_at: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    cookie_secure: bool,
    entries: RwLock<HashMap<Vec<u8>, Entry>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration, cookie_secure: bool) -> Self {
        Self {
            ttl,
            cookie_secure,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    /// Session data for `token`, or `None` when unknown or expired.
    pub async fn load(&self, token: &str) -> Option<SessionData> {
        self.load_at(token, Instant::now()).await
    }

    pub(crate) async fn load_at(&self, token: &str, now: Instant) -> Option<SessionData> {
        let key = cookie::hash_session_token(token);
        let entries = self.entries.read().await;
        entries
            .get(&key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.data.clone())
    }

    /// Store `data` under `token`, restarting its TTL.
    pub async fn save(&self, token: &str, data: SessionData) {
        self.save_at(token, data, Instant::now()).await;
    }

    pub(crate) async fn save_at(&self, token: &str, data: SessionData, now: Instant) {
        let key = cookie::hash_session_token(token);
        let entry = Entry {
            data,
            expires_at: now + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    pub async fn remove(&self, token: &str) {
        let key = cookie::hash_session_token(token);
        self.entries.write().await.remove(&key);
    }

    /// Drop expired sessions, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }

    pub(crate) async fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Periodically drop expired sessions until the runtime shuts down.
pub fn spawn_reaper(store: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                debug!(purged, "expired sessions removed");
            }
        }
    })
}
