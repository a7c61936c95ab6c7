//! External login model - a provider-asserted credential linked to an account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External login entity, unique on (provider, provider_key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLogin {
    pub provider: String,
    pub provider_key: String,
    pub account_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl ExternalLogin {
    pub fn new(provider: String, provider_key: String, account_id: Uuid) -> Self {
        Self {
            provider,
            provider_key,
            account_id,
            created_utc: Utc::now(),
        }
    }
}

/// Identity asserted by an external provider after its handshake completes.
///
/// The email is whatever the provider claims and is only trusted as a
/// pre-filled suggestion during the confirmation step.
#[derive(Debug, Clone)]
pub struct ExternalAssertion {
    pub provider: String,
    pub provider_key: String,
    pub email: Option<String>,
}
