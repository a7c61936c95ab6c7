//! In-memory store used by tests and embedded deployments.

use crate::models::{Account, ErrorRecord, ExternalLogin, SecurityToken, TokenPurpose};
use crate::store::{AccountFilter, AccountStore, ErrorLogStore, ExternalLoginStore, StoreError, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// DashMap-backed implementation of every store contract.
///
/// Per-entry locking gives the same atomicity the SQL implementation gets
/// from conditional updates: `update` compares `row_version` and `redeem`
/// marks a token used while holding that token's entry guard.
#[derive(Default)]
pub struct MemoryStore {
    accounts: DashMap<Uuid, Account>,
    logins: DashMap<(String, String), ExternalLogin>,
    tokens: DashMap<String, SecurityToken>,
    errors: RwLock<Vec<ErrorRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_account_by_email(&self, email: &str) -> Option<Account> {
        let needle = email.to_lowercase();
        self.accounts
            .iter()
            .find(|entry| entry.value().email.to_lowercase() == needle)
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(&account_id).map(|a| a.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.find_account_by_email(email))
    }

    async fn email_in_use(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.find_account_by_email(email).is_some())
    }

    async fn create(&self, account: &Account) -> Result<(), StoreError> {
        if self.find_account_by_email(&account.email).is_some() {
            return Err(StoreError::Duplicate);
        }
        self.accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn update(&self, account: &mut Account) -> Result<(), StoreError> {
        let mut stored = self
            .accounts
            .get_mut(&account.account_id)
            .ok_or(StoreError::NotFound)?;
        if stored.row_version != account.row_version {
            return Err(StoreError::Conflict);
        }
        account.row_version += 1;
        account.modified_utc = Utc::now();
        *stored = account.clone();
        Ok(())
    }

    async fn list(
        &self,
        filter: &AccountFilter,
        offset: u32,
        page_size: u32,
    ) -> Result<Vec<Account>, StoreError> {
        let mut rows: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|a| match filter.client_id {
                Some(client_id) => a.client_id == Some(client_id),
                None => true,
            })
            .filter(|a| match &filter.email_contains {
                Some(fragment) => a.email.to_lowercase().contains(&fragment.to_lowercase()),
                None => true,
            })
            .collect();
        rows.sort_by_key(|a| a.created_utc);
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(page_size as usize)
            .collect())
    }
}

#[async_trait]
impl ExternalLoginStore for MemoryStore {
    async fn find(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<ExternalLogin>, StoreError> {
        let key = (provider.to_string(), provider_key.to_string());
        Ok(self.logins.get(&key).map(|l| l.clone()))
    }

    async fn for_account(&self, account_id: Uuid) -> Result<Vec<ExternalLogin>, StoreError> {
        let mut rows: Vec<ExternalLogin> = self
            .logins
            .iter()
            .filter(|entry| entry.value().account_id == account_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|l| l.created_utc);
        Ok(rows)
    }

    async fn add(&self, login: &ExternalLogin) -> Result<(), StoreError> {
        let key = (login.provider.clone(), login.provider_key.clone());
        match self.logins.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Duplicate),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(login.clone());
                Ok(())
            }
        }
    }

    async fn remove(
        &self,
        account_id: Uuid,
        provider: &str,
        provider_key: &str,
    ) -> Result<bool, StoreError> {
        let key = (provider.to_string(), provider_key.to_string());
        Ok(self
            .logins
            .remove_if(&key, |_, login| login.account_id == account_id)
            .is_some())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &SecurityToken) -> Result<(), StoreError> {
        self.tokens.insert(token.token_digest.clone(), token.clone());
        Ok(())
    }

    async fn redeem(
        &self,
        account_id: Uuid,
        purpose: TokenPurpose,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SecurityToken>, StoreError> {
        // The entry guard makes the check-and-mark atomic.
        let mut entry = match self.tokens.get_mut(token_digest) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let token = entry.value_mut();
        if token.account_id != account_id || token.purpose != purpose || !token.is_live(now) {
            return Ok(None);
        }
        token.used_utc = Some(now);
        Ok(Some(token.clone()))
    }
}

#[async_trait]
impl ErrorLogStore for MemoryStore {
    async fn append(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        let mut errors = self
            .errors
            .write()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("error log lock poisoned")))?;
        errors.push(record.clone());
        Ok(())
    }

    async fn list(&self, offset: u32, page_size: u32) -> Result<Vec<ErrorRecord>, StoreError> {
        let errors = self
            .errors
            .read()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("error log lock poisoned")))?;
        Ok(errors
            .iter()
            .rev()
            .skip(offset as usize)
            .take(page_size as usize)
            .cloned()
            .collect())
    }
}
