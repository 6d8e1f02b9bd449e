//! Postgres-backed credential store (`users` table, `userlist` view).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{
    Account, AccountSummary, AccountWrite, CredentialStore, StoreError, VerifyOutcome, password,
};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        write: AccountWrite,
        password_hash: String,
    ) -> Result<Account, StoreError> {
        let id = Uuid::new_v4();
        let token = Uuid::new_v4();
        let query = r"
            INSERT INTO users
                (id, username, password, token, email, phone, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING created_at
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(&write.username)
            .bind(password_hash)
            .bind(token)
            .bind(&write.email)
            .bind(&write.phone)
            .bind(write.active)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(translate_write_error)?;

        Ok(Account {
            id,
            username: write.username,
            email: write.email,
            phone: write.phone,
            token,
            active: write.active,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn update(
        &self,
        id: Uuid,
        write: AccountWrite,
        password_hash: String,
    ) -> Result<Account, StoreError> {
        let token = Uuid::new_v4();
        let query = r"
            UPDATE users
            SET username = $1,
                password = $2,
                email = $3,
                phone = $4,
                token = $5,
                active = $6
            WHERE id = $7
            RETURNING created_at
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&write.username)
            .bind(password_hash)
            .bind(&write.email)
            .bind(&write.phone)
            .bind(token)
            .bind(write.active)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(translate_write_error)?
            .ok_or(StoreError::NotFound(id))?;

        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        Ok(Account {
            id,
            username: write.username,
            email: write.email,
            phone: write.phone,
            token,
            active: write.active,
            created_at,
        })
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn write(&self, write: AccountWrite) -> Result<Account, StoreError> {
        let password_hash = password::hash_password(write.password.clone()).await?;
        match write.id {
            Some(id) => self.update(id, write, password_hash).await,
            None => self.insert(write, password_hash).await,
        }
    }

    async fn username_exists(
        &self,
        username: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        // NULL never equals an id, so `excluding = None` checks every row.
        let query = r"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE username = $1
                  AND id IS DISTINCT FROM $2
            ) AS taken
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .bind(excluding)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.try_get("taken")?)
    }

    async fn find_by_identity(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = r"
            SELECT id, username, email, phone, token, active, created_at
            FROM users
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn verify(&self, username: &str, password: &str) -> Result<VerifyOutcome, StoreError> {
        let query = r"
            SELECT id, username, password, email, phone, token, active, created_at
            FROM users
            WHERE username = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        let Some(row) = row else {
            password::verify_unknown(password.to_string()).await;
            return Ok(VerifyOutcome::UnknownUsername);
        };

        let hash: String = row.try_get("password")?;
        if password::verify_password(hash, password.to_string()).await? {
            Ok(VerifyOutcome::Matched(account_from_row(&row)?))
        } else {
            Ok(VerifyOutcome::HashMismatch)
        }
    }

    async fn list(&self) -> Result<Vec<AccountSummary>, StoreError> {
        let query = "SELECT id, username FROM userlist ORDER BY username";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;
        rows.iter()
            .map(|row| -> Result<AccountSummary, StoreError> {
                Ok(AccountSummary {
                    id: row.try_get("id")?,
                    username: row.try_get("username")?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

/// Decode an account row. Columns are owned by the migration tooling, so a
/// type or nullability drift surfaces as an error instead of a panic.
fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        token: row.try_get("token")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn translate_write_error(err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::UsernameTaken
    } else {
        StoreError::Persistence(err)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
