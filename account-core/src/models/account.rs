//! Account model - the persisted user record.

use crate::models::role::Role;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account entity.
///
/// `password_hash` is optional: accounts created through an external login
/// provider may have no local password at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: Uuid,
    pub email: String,
    pub email_confirmed: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub phone_confirmed: bool,
    pub two_factor_enabled: bool,
    pub failed_attempts: i32,
    pub lockout_until_utc: Option<DateTime<Utc>>,
    pub client_id: Option<Uuid>,
    pub roles: Vec<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub modified_utc: DateTime<Utc>,
    /// Optimistic-concurrency token, bumped by the store on every update.
    pub row_version: i64,
}

impl Account {
    /// Create a new account with no credentials attached yet.
    pub fn new(email: String) -> Self {
        let now = Utc::now();
        Self {
            account_id: Uuid::new_v4(),
            email,
            email_confirmed: false,
            password_hash: None,
            phone: None,
            phone_confirmed: false,
            two_factor_enabled: false,
            failed_attempts: 0,
            lockout_until_utc: None,
            client_id: None,
            roles: vec![Role::Member],
            first_name: None,
            last_name: None,
            created_utc: now,
            modified_utc: now,
            row_version: 0,
        }
    }

    pub fn with_password_hash(mut self, hash: String) -> Self {
        self.password_hash = Some(hash);
        self
    }

    pub fn with_client(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_in_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Check whether the lockout window is still open at `now`.
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lockout_until_utc, Some(until) if until > now)
    }

    /// Record a failed credential check. Returns true when this failure
    /// crossed the threshold and opened a lockout window.
    pub fn record_failed_attempt(&mut self, max_attempts: u32, lockout: Duration) -> bool {
        self.failed_attempts += 1;
        if self.failed_attempts >= max_attempts as i32 {
            self.lockout_until_utc = Some(Utc::now() + lockout);
            self.failed_attempts = 0;
            return true;
        }
        false
    }

    /// Force the lockout window open regardless of the counter, used when
    /// two-factor verification attempts are exhausted.
    pub fn lock_out(&mut self, lockout: Duration) {
        self.failed_attempts = 0;
        self.lockout_until_utc = Some(Utc::now() + lockout);
    }

    /// Clear failure bookkeeping after a successful credential check or a
    /// completed password reset.
    pub fn reset_access_failures(&mut self) {
        self.failed_attempts = 0;
        self.lockout_until_utc = None;
    }
}

/// Management view of an account: what a signed-in user sees about their
/// own sign-in methods.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account_id: Uuid,
    pub email: String,
    pub email_confirmed: bool,
    pub has_password: bool,
    pub phone: Option<String>,
    pub phone_confirmed: bool,
    pub two_factor_enabled: bool,
    pub logins: Vec<crate::models::external_login::ExternalLogin>,
    pub remembered_devices: Vec<crate::models::two_factor::RememberedDevice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockout_threshold() {
        let mut account = Account::new("a@example.com".to_string());
        for _ in 0..4 {
            assert!(!account.record_failed_attempt(5, Duration::minutes(15)));
        }
        assert!(account.record_failed_attempt(5, Duration::minutes(15)));
        assert!(account.is_locked_out(Utc::now()));
        // Counter restarts with the window.
        assert_eq!(account.failed_attempts, 0);
    }

    #[test]
    fn test_reset_access_failures() {
        let mut account = Account::new("a@example.com".to_string());
        account.record_failed_attempt(1, Duration::minutes(15));
        account.reset_access_failures();
        assert!(!account.is_locked_out(Utc::now()));
        assert_eq!(account.failed_attempts, 0);
    }

    #[test]
    fn test_expired_lockout_is_not_locked() {
        let mut account = Account::new("a@example.com".to_string());
        account.lockout_until_utc = Some(Utc::now() - Duration::minutes(1));
        assert!(!account.is_locked_out(Utc::now()));
    }
}
