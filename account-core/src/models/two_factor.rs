//! Two-factor challenge state - ephemeral, never persisted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channels for one-time codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeProvider {
    Email,
    Sms,
}

impl ChallengeProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeProvider::Email => "email",
            ChallengeProvider::Sms => "sms",
        }
    }
}

impl std::str::FromStr for ChallengeProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(ChallengeProvider::Email),
            "sms" => Ok(ChallengeProvider::Sms),
            _ => Err(format!("Invalid challenge provider: {}", s)),
        }
    }
}

/// Pending two-factor session, created when primary credentials verify but
/// a second factor is still outstanding. Lives only in the in-process
/// cache and dies with it.
#[derive(Debug, Clone)]
pub struct PendingTwoFactorSession {
    pub session_token: Uuid,
    pub account_id: Uuid,
    /// Set once a code has been issued through a concrete channel.
    pub provider: Option<ChallengeProvider>,
    pub code_digest: Option<String>,
    pub attempts: u32,
    pub remember_me: bool,
    pub issued_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
}

impl PendingTwoFactorSession {
    pub fn new(account_id: Uuid, remember_me: bool, time_to_live: Duration) -> Self {
        let now = Utc::now();
        Self {
            session_token: Uuid::new_v4(),
            account_id,
            provider: None,
            code_digest: None,
            attempts: 0,
            remember_me,
            issued_utc: now,
            expiry_utc: now + time_to_live,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_utc
    }
}

/// A device exempted from two-factor challenges for a bounded period.
///
/// Deliberately its own record with its own expiry, not a property of the
/// session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RememberedDevice {
    pub account_id: Uuid,
    pub device_id: String,
    pub expiry_utc: DateTime<Utc>,
}
