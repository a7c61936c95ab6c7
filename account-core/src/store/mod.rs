//! Persistence contracts consumed by the account services.
//!
//! Implementations own serialization of concurrent updates to a single
//! account: `update` is optimistic on `row_version`, and token redemption
//! is a single conditional mark-and-check so two racing redemptions can
//! never both observe a live token.

pub mod memory;
pub mod postgres;

use crate::models::{Account, ErrorRecord, ExternalLogin, SecurityToken, TokenPurpose};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic-concurrency conflict: the row changed underneath the
    /// caller. Reload and retry.
    #[error("Concurrent update conflict")]
    Conflict,

    /// A uniqueness constraint (email, login pair) was violated.
    #[error("Duplicate key")]
    Duplicate,

    #[error("Record not found")]
    NotFound,

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Filter payload for account listings. Visibility scoping overrides
/// `client_id` before the filter reaches the store.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub client_id: Option<Uuid>,
    pub email_contains: Option<String>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Case-insensitive email lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn email_in_use(&self, email: &str) -> Result<bool, StoreError>;

    async fn create(&self, account: &Account) -> Result<(), StoreError>;

    /// Persist changes to an existing account. Matches on
    /// `account.row_version` and fails with [`StoreError::Conflict`] when
    /// the stored row has moved on; on success the store bumps
    /// `row_version` and `modified_utc` both in place and at rest.
    async fn update(&self, account: &mut Account) -> Result<(), StoreError>;

    /// Filtered, paginated listing ordered by creation time.
    async fn list(
        &self,
        filter: &AccountFilter,
        offset: u32,
        page_size: u32,
    ) -> Result<Vec<Account>, StoreError>;
}

#[async_trait]
pub trait ExternalLoginStore: Send + Sync {
    async fn find(&self, provider: &str, provider_key: &str)
        -> Result<Option<ExternalLogin>, StoreError>;

    async fn for_account(&self, account_id: Uuid) -> Result<Vec<ExternalLogin>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the (provider, key) pair
    /// is already linked to any account.
    async fn add(&self, login: &ExternalLogin) -> Result<(), StoreError>;

    /// Returns true when a row was actually removed.
    async fn remove(
        &self,
        account_id: Uuid,
        provider: &str,
        provider_key: &str,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &SecurityToken) -> Result<(), StoreError>;

    /// Atomically redeem a token: marks it used if and only if it belongs
    /// to the account, carries the purpose, matches the digest, has not
    /// expired, and has not been used before. Returns the redeemed token,
    /// or `None` when no live token matched. Concurrent calls with the
    /// same token yield at most one `Some`.
    async fn redeem(
        &self,
        account_id: Uuid,
        purpose: TokenPurpose,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SecurityToken>, StoreError>;
}

#[async_trait]
pub trait ErrorLogStore: Send + Sync {
    async fn append(&self, record: &ErrorRecord) -> Result<(), StoreError>;

    /// Most recent entries first.
    async fn list(&self, offset: u32, page_size: u32) -> Result<Vec<ErrorRecord>, StoreError>;
}
