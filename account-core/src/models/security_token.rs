//! Security token model - single-use, time-limited tokens bound to an
//! account and a purpose.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token purpose codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailConfirmation,
    PasswordReset,
    PhoneConfirmation,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailConfirmation => "email_confirmation",
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::PhoneConfirmation => "phone_confirmation",
        }
    }
}

impl std::str::FromStr for TokenPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_confirmation" => Ok(TokenPurpose::EmailConfirmation),
            "password_reset" => Ok(TokenPurpose::PasswordReset),
            "phone_confirmation" => Ok(TokenPurpose::PhoneConfirmation),
            _ => Err(format!("Invalid token purpose: {}", s)),
        }
    }
}

/// Security token entity. Only the digest of the raw token is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityToken {
    pub token_id: Uuid,
    pub account_id: Uuid,
    pub purpose: TokenPurpose,
    pub token_digest: String,
    /// Purpose-specific data carried with the token, e.g. the phone number
    /// a phone-confirmation code was issued for.
    pub payload: Option<String>,
    pub expiry_utc: DateTime<Utc>,
    pub used_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl SecurityToken {
    pub fn new(
        account_id: Uuid,
        purpose: TokenPurpose,
        token_digest: String,
        time_to_live: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_id: Uuid::new_v4(),
            account_id,
            purpose,
            token_digest,
            payload: None,
            expiry_utc: now + time_to_live,
            used_utc: None,
            created_utc: now,
        }
    }

    pub fn with_payload(mut self, payload: String) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_utc
    }

    /// Still redeemable: not expired and never used.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.used_utc.is_none() && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lifecycle_flags() {
        let mut token = SecurityToken::new(
            Uuid::new_v4(),
            TokenPurpose::PasswordReset,
            "digest".to_string(),
            Duration::minutes(60),
        );
        let now = Utc::now();
        assert!(token.is_live(now));

        token.used_utc = Some(now);
        assert!(!token.is_live(now));
    }

    #[test]
    fn test_expired_token_is_not_live() {
        let token = SecurityToken::new(
            Uuid::new_v4(),
            TokenPurpose::EmailConfirmation,
            "digest".to_string(),
            Duration::minutes(-1),
        );
        assert!(!token.is_live(Utc::now()));
    }
}
