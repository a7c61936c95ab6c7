//! Session issuance collaborator.
//!
//! Cookie or token issuance belongs to the hosting layer; the account
//! state machine only signals the transitions.

use crate::models::Account;
use crate::services::error::ServiceError;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait SessionIssuer: Send + Sync {
    /// Establish a session for the account. `persistent` carries the
    /// caller's remember-me choice through to the cookie/token lifetime.
    async fn sign_in(&self, account: &Account, persistent: bool) -> Result<(), ServiceError>;

    async fn sign_out(&self, account_id: Uuid) -> Result<(), ServiceError>;
}

/// Issuer that does nothing, for embedding the core without a session
/// layer (batch tools, tests).
#[derive(Debug, Clone, Default)]
pub struct NullSessionIssuer;

#[async_trait]
impl SessionIssuer for NullSessionIssuer {
    async fn sign_in(&self, account: &Account, _persistent: bool) -> Result<(), ServiceError> {
        tracing::debug!(account_id = %account.account_id, "Session issuance skipped");
        Ok(())
    }

    async fn sign_out(&self, _account_id: Uuid) -> Result<(), ServiceError> {
        Ok(())
    }
}
