//! PostgreSQL store implementation.

use crate::models::{Account, ErrorRecord, ExternalLogin, Role, SecurityToken, TokenPurpose};
use crate::store::{AccountFilter, AccountStore, ErrorLogStore, ExternalLoginStore, StoreError, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

/// Pool settings for [`PgStore::connect`].
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// PostgreSQL-backed implementation of every store contract.
///
/// Optimistic concurrency and single-use redemption are both expressed as
/// conditional UPDATEs so the database is the arbiter of races.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        tracing::info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(&config.url)
            .await?;

        tracing::info!("Successfully connected to PostgreSQL");

        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate;
        }
    }
    StoreError::Backend(anyhow::Error::new(err))
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    account_id: Uuid,
    email: String,
    email_confirmed: bool,
    password_hash: Option<String>,
    phone: Option<String>,
    phone_confirmed: bool,
    two_factor_enabled: bool,
    failed_attempts: i32,
    lockout_until_utc: Option<DateTime<Utc>>,
    client_id: Option<Uuid>,
    roles: Vec<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    created_utc: DateTime<Utc>,
    modified_utc: DateTime<Utc>,
    row_version: i64,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        let roles = row
            .roles
            .iter()
            .filter_map(|code| match code.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    tracing::warn!(role = %code, "Dropping unrecognized role code");
                    None
                }
            })
            .collect();
        Account {
            account_id: row.account_id,
            email: row.email,
            email_confirmed: row.email_confirmed,
            password_hash: row.password_hash,
            phone: row.phone,
            phone_confirmed: row.phone_confirmed,
            two_factor_enabled: row.two_factor_enabled,
            failed_attempts: row.failed_attempts,
            lockout_until_utc: row.lockout_until_utc,
            client_id: row.client_id,
            roles,
            first_name: row.first_name,
            last_name: row.last_name,
            created_utc: row.created_utc,
            modified_utc: row.modified_utc,
            row_version: row.row_version,
        }
    }
}

fn role_codes(account: &Account) -> Vec<String> {
    account.roles.iter().map(|r| r.as_str().to_string()).collect()
}

const ACCOUNT_COLUMNS: &str = "account_id, email, email_confirmed, password_hash, phone, \
     phone_confirmed, two_factor_enabled, failed_attempts, lockout_until_utc, client_id, \
     roles, first_name, last_name, created_utc, modified_utc, row_version";

#[async_trait]
impl AccountStore for PgStore {
    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Account::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Account::from))
    }

    async fn email_in_use(&self, email: &str) -> Result<bool, StoreError> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT account_id FROM accounts WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(found.is_some())
    }

    async fn create(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO accounts (account_id, email, email_confirmed, password_hash, phone, \
             phone_confirmed, two_factor_enabled, failed_attempts, lockout_until_utc, client_id, \
             roles, first_name, last_name, created_utc, modified_utc, row_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(account.account_id)
        .bind(&account.email)
        .bind(account.email_confirmed)
        .bind(&account.password_hash)
        .bind(&account.phone)
        .bind(account.phone_confirmed)
        .bind(account.two_factor_enabled)
        .bind(account.failed_attempts)
        .bind(account.lockout_until_utc)
        .bind(account.client_id)
        .bind(role_codes(account))
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.created_utc)
        .bind(account.modified_utc)
        .bind(account.row_version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update(&self, account: &mut Account) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE accounts SET email = $3, email_confirmed = $4, password_hash = $5, \
             phone = $6, phone_confirmed = $7, two_factor_enabled = $8, failed_attempts = $9, \
             lockout_until_utc = $10, client_id = $11, roles = $12, first_name = $13, \
             last_name = $14, modified_utc = $15, row_version = row_version + 1 \
             WHERE account_id = $1 AND row_version = $2",
        )
        .bind(account.account_id)
        .bind(account.row_version)
        .bind(&account.email)
        .bind(account.email_confirmed)
        .bind(&account.password_hash)
        .bind(&account.phone)
        .bind(account.phone_confirmed)
        .bind(account.two_factor_enabled)
        .bind(account.failed_attempts)
        .bind(account.lockout_until_utc)
        .bind(account.client_id)
        .bind(role_codes(account))
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        account.row_version += 1;
        account.modified_utc = now;
        Ok(())
    }

    async fn list(
        &self,
        filter: &AccountFilter,
        offset: u32,
        page_size: u32,
    ) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE ($1::uuid IS NULL OR client_id = $1) \
             AND ($2::text IS NULL OR email ILIKE '%' || $2 || '%') \
             ORDER BY created_utc OFFSET $3 LIMIT $4"
        ))
        .bind(filter.client_id)
        .bind(&filter.email_contains)
        .bind(offset as i64)
        .bind(page_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Account::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ExternalLoginRow {
    provider: String,
    provider_key: String,
    account_id: Uuid,
    created_utc: DateTime<Utc>,
}

impl From<ExternalLoginRow> for ExternalLogin {
    fn from(row: ExternalLoginRow) -> Self {
        ExternalLogin {
            provider: row.provider,
            provider_key: row.provider_key,
            account_id: row.account_id,
            created_utc: row.created_utc,
        }
    }
}

#[async_trait]
impl ExternalLoginStore for PgStore {
    async fn find(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<ExternalLogin>, StoreError> {
        let row = sqlx::query_as::<_, ExternalLoginRow>(
            "SELECT provider, provider_key, account_id, created_utc FROM external_logins \
             WHERE provider = $1 AND provider_key = $2",
        )
        .bind(provider)
        .bind(provider_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(ExternalLogin::from))
    }

    async fn for_account(&self, account_id: Uuid) -> Result<Vec<ExternalLogin>, StoreError> {
        let rows = sqlx::query_as::<_, ExternalLoginRow>(
            "SELECT provider, provider_key, account_id, created_utc FROM external_logins \
             WHERE account_id = $1 ORDER BY created_utc",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(ExternalLogin::from).collect())
    }

    async fn add(&self, login: &ExternalLogin) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO external_logins (provider, provider_key, account_id, created_utc) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&login.provider)
        .bind(&login.provider_key)
        .bind(login.account_id)
        .bind(login.created_utc)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn remove(
        &self,
        account_id: Uuid,
        provider: &str,
        provider_key: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM external_logins \
             WHERE account_id = $1 AND provider = $2 AND provider_key = $3",
        )
        .bind(account_id)
        .bind(provider)
        .bind(provider_key)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct SecurityTokenRow {
    token_id: Uuid,
    account_id: Uuid,
    purpose_code: String,
    token_digest: String,
    payload: Option<String>,
    expiry_utc: DateTime<Utc>,
    used_utc: Option<DateTime<Utc>>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<SecurityTokenRow> for SecurityToken {
    type Error = StoreError;

    fn try_from(row: SecurityTokenRow) -> Result<Self, Self::Error> {
        let purpose = row
            .purpose_code
            .parse::<TokenPurpose>()
            .map_err(|e| StoreError::Backend(anyhow::anyhow!(e)))?;
        Ok(SecurityToken {
            token_id: row.token_id,
            account_id: row.account_id,
            purpose,
            token_digest: row.token_digest,
            payload: row.payload,
            expiry_utc: row.expiry_utc,
            used_utc: row.used_utc,
            created_utc: row.created_utc,
        })
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, token: &SecurityToken) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO security_tokens (token_id, account_id, purpose_code, token_digest, \
             payload, expiry_utc, used_utc, created_utc) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(token.token_id)
        .bind(token.account_id)
        .bind(token.purpose.as_str())
        .bind(&token.token_digest)
        .bind(&token.payload)
        .bind(token.expiry_utc)
        .bind(token.used_utc)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn redeem(
        &self,
        account_id: Uuid,
        purpose: TokenPurpose,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SecurityToken>, StoreError> {
        let row = sqlx::query_as::<_, SecurityTokenRow>(
            "UPDATE security_tokens SET used_utc = $4 \
             WHERE account_id = $1 AND purpose_code = $2 AND token_digest = $3 \
             AND used_utc IS NULL AND expiry_utc > $4 \
             RETURNING token_id, account_id, purpose_code, token_digest, payload, \
             expiry_utc, used_utc, created_utc",
        )
        .bind(account_id)
        .bind(purpose.as_str())
        .bind(token_digest)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(SecurityToken::try_from).transpose()
    }
}

#[async_trait]
impl ErrorLogStore for PgStore {
    async fn append(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO error_log (error_id, source, message, detail, created_utc) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.error_id)
        .bind(&record.source)
        .bind(&record.message)
        .bind(&record.detail)
        .bind(record.created_utc)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list(&self, offset: u32, page_size: u32) -> Result<Vec<ErrorRecord>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct ErrorRow {
            error_id: Uuid,
            source: String,
            message: String,
            detail: Option<String>,
            created_utc: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, ErrorRow>(
            "SELECT error_id, source, message, detail, created_utc FROM error_log \
             ORDER BY created_utc DESC OFFSET $1 LIMIT $2",
        )
        .bind(offset as i64)
        .bind(page_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows
            .into_iter()
            .map(|row| ErrorRecord {
                error_id: row.error_id,
                source: row.source,
                message: row.message,
                detail: row.detail,
                created_utc: row.created_utc,
            })
            .collect())
    }
}
