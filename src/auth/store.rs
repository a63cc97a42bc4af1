use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::account::{Account, NewAccount, Profile};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The insert violated a uniqueness constraint. The store constraint,
    /// not the caller's pre-flight check, is the authoritative guard.
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Keyed record store for accounts, unique on both `username` and `email`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Pre-flight uniqueness probe: matches either key.
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> anyhow::Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>>;

    /// Insert a new account. Uniqueness on both keys is enforced
    /// atomically here; a violation surfaces as `StoreError::Duplicate`.
    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError>;
}

/// Postgres-backed store.
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    profile: sqlx::types::Json<Profile>,
    created_at: OffsetDateTime,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            profile: row.profile.0,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, username, email, password_hash, profile, created_at
            FROM users
            WHERE email = $1 OR username = $2
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, username, email, password_hash, profile, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, username, email, password_hash, profile, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO users (username, email, password_hash, profile)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, profile, created_at
            "#,
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(sqlx::types::Json(&account.profile))
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Other(e.into()),
        })?;
        Ok(row.into())
    }
}

/// In-memory store with the same check-and-insert atomicity, used by
/// `AppState::fake()` and the flow tests.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: std::sync::Mutex<Vec<Account>>,
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> anyhow::Result<Option<Account>> {
        let accounts = self.accounts.lock().expect("store lock");
        Ok(accounts
            .iter()
            .find(|a| a.email == email || a.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        let accounts = self.accounts.lock().expect("store lock");
        Ok(accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
        let accounts = self.accounts.lock().expect("store lock");
        Ok(accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        // Single lock spans the check and the push: the linearization point.
        let mut accounts = self.accounts.lock().expect("store lock");
        if accounts
            .iter()
            .any(|a| a.email == account.email || a.username == account.username)
        {
            return Err(StoreError::Duplicate);
        }
        let account = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            profile: account.profile,
            created_at: OffsetDateTime::now_utc(),
        };
        accounts.push(account.clone());
        Ok(account)
    }
}
