//! Primary credential verification with lockout bookkeeping.

use crate::config::LockoutConfig;
use crate::models::Account;
use crate::services::challenge::RememberedDevices;
use crate::services::error::ServiceError;
use crate::store::{AccountStore, StoreError};
use crate::utils::{verify_password, Password, PasswordHashString};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Bounded retries for optimistic-concurrency conflicts on the
/// failed-attempt counter.
const MAX_UPDATE_RETRIES: u32 = 3;

/// Outcome of a primary credential check.
#[derive(Debug)]
pub enum Verification {
    Success(Account),
    LockedOut,
    /// Credentials are good but a second factor is outstanding.
    RequiresTwoFactor(Account),
    Failure,
}

/// Verifies an identifier + secret pair against the account store.
///
/// Callers never learn whether the identifier or the secret was wrong.
pub struct CredentialVerifier {
    accounts: Arc<dyn AccountStore>,
    devices: Arc<RememberedDevices>,
    config: LockoutConfig,
}

impl CredentialVerifier {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        devices: Arc<RememberedDevices>,
        config: LockoutConfig,
    ) -> Self {
        Self {
            accounts,
            devices,
            config,
        }
    }

    /// Check `password` for the account behind `email`.
    ///
    /// `device_id` identifies the client for the remembered-device
    /// exemption; `None` always takes the two-factor path when the account
    /// has it enabled.
    pub async fn verify(
        &self,
        email: &str,
        password: &str,
        device_id: Option<&str>,
    ) -> Result<Verification, ServiceError> {
        let account = match self.accounts.find_by_email(email).await? {
            Some(account) => account,
            None => return Ok(Verification::Failure),
        };

        let now = Utc::now();
        if account.is_locked_out(now) {
            tracing::warn!(account_id = %account.account_id, "Sign-in attempt while locked out");
            return Ok(Verification::LockedOut);
        }

        let matches = match &account.password_hash {
            Some(hash) => verify_password(
                &Password::new(password.to_string()),
                &PasswordHashString::new(hash.clone()),
            ),
            // External-login-only accounts never pass a password check.
            None => false,
        };

        if !matches {
            let locked = self.register_failure(account).await?;
            return Ok(if locked {
                Verification::LockedOut
            } else {
                Verification::Failure
            });
        }

        let account = self.clear_failures(account).await?;

        if account.two_factor_enabled {
            let remembered = device_id
                .map(|device| self.devices.is_remembered(account.account_id, device))
                .unwrap_or(false);
            if !remembered {
                return Ok(Verification::RequiresTwoFactor(account));
            }
        }

        Ok(Verification::Success(account))
    }

    /// Open the lockout window regardless of the current counter, used
    /// when the two-factor attempt budget is exhausted.
    pub async fn lock_out(&self, account_id: uuid::Uuid) -> Result<(), ServiceError> {
        let mut account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        for _ in 0..MAX_UPDATE_RETRIES {
            account.lock_out(self.lockout_window());
            match self.accounts.update(&mut account).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict) => {
                    account = self
                        .accounts
                        .find_by_id(account_id)
                        .await?
                        .ok_or(StoreError::NotFound)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Conflict.into())
    }

    fn lockout_window(&self) -> Duration {
        Duration::minutes(self.config.lockout_minutes)
    }

    /// Count a failed check, persisting through version conflicts so
    /// concurrent attempts cannot lose increments. Returns true when the
    /// lockout window opened.
    async fn register_failure(&self, mut account: Account) -> Result<bool, ServiceError> {
        for _ in 0..MAX_UPDATE_RETRIES {
            let locked =
                account.record_failed_attempt(self.config.max_failed_attempts, self.lockout_window());
            match self.accounts.update(&mut account).await {
                Ok(()) => {
                    if locked {
                        tracing::warn!(account_id = %account.account_id, "Account locked out");
                    }
                    return Ok(locked);
                }
                Err(StoreError::Conflict) => {
                    account = match self.accounts.find_by_id(account.account_id).await? {
                        Some(fresh) => fresh,
                        None => return Ok(false),
                    };
                    // A concurrent attempt may already have opened the window.
                    if account.is_locked_out(Utc::now()) {
                        return Ok(true);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Conflict.into())
    }

    async fn clear_failures(&self, mut account: Account) -> Result<Account, ServiceError> {
        if account.failed_attempts == 0 && account.lockout_until_utc.is_none() {
            return Ok(account);
        }
        for _ in 0..MAX_UPDATE_RETRIES {
            account.reset_access_failures();
            match self.accounts.update(&mut account).await {
                Ok(()) => return Ok(account),
                Err(StoreError::Conflict) => {
                    account = match self.accounts.find_by_id(account.account_id).await? {
                        Some(fresh) => fresh,
                        None => return Err(StoreError::NotFound.into()),
                    };
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Conflict.into())
    }
}
