//! Two-factor challenge manager.
//!
//! Pending sessions and remembered devices are process-local state with
//! absolute expiries; nothing here is ever persisted.

use crate::config::ChallengeConfig;
use crate::models::{ChallengeProvider, PendingTwoFactorSession, RememberedDevice};
use crate::utils::{digest_matches, generate_numeric_code, token_digest};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Devices exempted from two-factor challenges, each with its own expiry.
#[derive(Default)]
pub struct RememberedDevices {
    entries: DashMap<(Uuid, String), RememberedDevice>,
}

impl RememberedDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, account_id: Uuid, device_id: &str, time_to_live: Duration) {
        let record = RememberedDevice {
            account_id,
            device_id: device_id.to_string(),
            expiry_utc: Utc::now() + time_to_live,
        };
        self.entries
            .insert((account_id, device_id.to_string()), record);
    }

    pub fn is_remembered(&self, account_id: Uuid, device_id: &str) -> bool {
        let key = (account_id, device_id.to_string());
        let now = Utc::now();
        let live = match self.entries.get(&key) {
            Some(record) => record.expiry_utc > now,
            None => return false,
        };
        if !live {
            // Expired entries are dropped on the read that notices them.
            self.entries.remove_if(&key, |_, record| record.expiry_utc <= now);
        }
        live
    }

    /// Live remembered-device records for an account.
    pub fn for_account(&self, account_id: Uuid) -> Vec<RememberedDevice> {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|entry| {
                entry.value().account_id == account_id && entry.value().expiry_utc > now
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn forget_all(&self, account_id: Uuid) {
        self.entries.retain(|(id, _), _| *id != account_id);
    }
}

/// A freshly issued one-time code, handed to the caller for out-of-band
/// delivery only.
pub struct IssuedCode {
    pub account_id: Uuid,
    pub provider: ChallengeProvider,
    pub code: String,
}

/// Outcome of a code verification attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Success { account_id: Uuid, remember_me: bool },
    /// Attempt budget exhausted; the session is gone and the caller is
    /// expected to lock the account out.
    LockedOut { account_id: Uuid },
    Failure,
}

/// In-process registry of pending two-factor sessions.
pub struct ChallengeManager {
    sessions: DashMap<Uuid, PendingTwoFactorSession>,
    /// Active session per account + provider; issuing through a channel
    /// invalidates the previous session on that channel.
    active_by_channel: DashMap<(Uuid, ChallengeProvider), Uuid>,
    config: ChallengeConfig,
}

impl ChallengeManager {
    pub fn new(config: ChallengeConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            active_by_channel: DashMap::new(),
            config,
        }
    }

    /// Open a pending session after primary credentials verified. Returns
    /// the opaque session token the client must present back.
    pub fn begin(&self, account_id: Uuid, remember_me: bool) -> Uuid {
        let session = PendingTwoFactorSession::new(
            account_id,
            remember_me,
            Duration::minutes(self.config.session_ttl_minutes),
        );
        let token = session.session_token;
        self.sessions.insert(token, session);
        tracing::debug!(account_id = %account_id, "Two-factor session opened");
        token
    }

    /// Generate a code for the session and bind it to a delivery channel.
    /// Returns `None` when the session is unknown or expired.
    pub fn issue_code(&self, session_token: Uuid, provider: ChallengeProvider) -> Option<IssuedCode> {
        let now = Utc::now();
        let mut session = self.sessions.get_mut(&session_token)?;
        if session.is_expired(now) {
            drop(session);
            self.sessions.remove(&session_token);
            return None;
        }

        let code = generate_numeric_code(self.config.code_length);
        session.provider = Some(provider);
        session.code_digest = Some(token_digest(&code));
        session.attempts = 0;
        let account_id = session.account_id;
        drop(session);

        // One outstanding challenge per account + provider: a new code
        // kills whatever was pending on that channel before.
        if let Some(previous) = self
            .active_by_channel
            .insert((account_id, provider), session_token)
        {
            if previous != session_token {
                self.sessions.remove(&previous);
            }
        }

        tracing::info!(account_id = %account_id, provider = provider.as_str(), "Two-factor code issued");
        Some(IssuedCode {
            account_id,
            provider,
            code,
        })
    }

    /// Verify a presented code. Fails closed on unknown or expired
    /// sessions; a success consumes the session.
    pub fn verify(&self, session_token: Uuid, code: &str) -> ChallengeOutcome {
        let now = Utc::now();
        let mut session = match self.sessions.get_mut(&session_token) {
            Some(session) => session,
            None => return ChallengeOutcome::Failure,
        };

        if session.is_expired(now) {
            drop(session);
            self.sessions.remove(&session_token);
            return ChallengeOutcome::Failure;
        }

        let digest = match &session.code_digest {
            Some(digest) => digest.clone(),
            // No code has been issued yet; nothing to compare against.
            None => return ChallengeOutcome::Failure,
        };

        if !digest_matches(code, &digest) {
            session.attempts += 1;
            let account_id = session.account_id;
            if session.attempts >= self.config.max_attempts {
                drop(session);
                self.discard(session_token);
                tracing::warn!(account_id = %account_id, "Two-factor attempts exhausted");
                return ChallengeOutcome::LockedOut { account_id };
            }
            return ChallengeOutcome::Failure;
        }

        let account_id = session.account_id;
        let remember_me = session.remember_me;
        drop(session);
        self.discard(session_token);
        ChallengeOutcome::Success {
            account_id,
            remember_me,
        }
    }

    /// Drop a session and any channel pointer at it.
    pub fn discard(&self, session_token: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&session_token) {
            if let Some(provider) = session.provider {
                self.active_by_channel
                    .remove_if(&(session.account_id, provider), |_, active| {
                        *active == session_token
                    });
            }
        }
    }

    pub fn remember_device_ttl(&self) -> Duration {
        Duration::days(self.config.remember_device_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ChallengeManager {
        ChallengeManager::new(ChallengeConfig {
            code_length: 6,
            session_ttl_minutes: 5,
            max_attempts: 3,
            remember_device_days: 30,
        })
    }

    #[test]
    fn test_verify_unknown_session_fails_closed() {
        let manager = manager();
        assert_eq!(manager.verify(Uuid::new_v4(), "123456"), ChallengeOutcome::Failure);
    }

    #[test]
    fn test_issue_and_verify() {
        let manager = manager();
        let account_id = Uuid::new_v4();
        let token = manager.begin(account_id, true);
        let issued = manager.issue_code(token, ChallengeProvider::Email).unwrap();

        let outcome = manager.verify(token, &issued.code);
        assert_eq!(
            outcome,
            ChallengeOutcome::Success {
                account_id,
                remember_me: true
            }
        );

        // Consumed: the same code + session cannot be replayed.
        assert_eq!(manager.verify(token, &issued.code), ChallengeOutcome::Failure);
    }

    #[test]
    fn test_verify_without_issued_code_fails() {
        let manager = manager();
        let token = manager.begin(Uuid::new_v4(), false);
        assert_eq!(manager.verify(token, "000000"), ChallengeOutcome::Failure);
    }

    #[test]
    fn test_attempt_budget_exhaustion() {
        let manager = manager();
        let account_id = Uuid::new_v4();
        let token = manager.begin(account_id, false);
        manager.issue_code(token, ChallengeProvider::Email).unwrap();

        assert_eq!(manager.verify(token, "wrong1"), ChallengeOutcome::Failure);
        assert_eq!(manager.verify(token, "wrong2"), ChallengeOutcome::Failure);
        assert_eq!(
            manager.verify(token, "wrong3"),
            ChallengeOutcome::LockedOut { account_id }
        );
        // Session destroyed with the lockout.
        assert_eq!(manager.verify(token, "wrong4"), ChallengeOutcome::Failure);
    }

    #[test]
    fn test_new_code_invalidates_previous_session_on_channel() {
        let manager = manager();
        let account_id = Uuid::new_v4();

        let first = manager.begin(account_id, false);
        let first_code = manager.issue_code(first, ChallengeProvider::Email).unwrap();

        let second = manager.begin(account_id, false);
        let second_code = manager.issue_code(second, ChallengeProvider::Email).unwrap();

        assert_eq!(manager.verify(first, &first_code.code), ChallengeOutcome::Failure);
        assert!(matches!(
            manager.verify(second, &second_code.code),
            ChallengeOutcome::Success { .. }
        ));
    }

    #[test]
    fn test_remembered_devices_expire() {
        let devices = RememberedDevices::new();
        let account_id = Uuid::new_v4();

        devices.remember(account_id, "device-a", Duration::days(30));
        assert!(devices.is_remembered(account_id, "device-a"));
        assert!(!devices.is_remembered(account_id, "device-b"));

        devices.remember(account_id, "device-c", Duration::seconds(-1));
        assert!(!devices.is_remembered(account_id, "device-c"));
    }
}
