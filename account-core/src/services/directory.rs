//! Account directory: role hierarchy, role sanitization and the
//! client-scoped account listing.

use crate::dtos::CreateAccountRequest;
use crate::models::{Account, Principal, Role};
use crate::services::error::ServiceError;
use crate::store::{AccountFilter, AccountStore, StoreError};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Roles a principal may hand out or revoke. Static by design: the
/// hierarchy is part of the security model, not data.
pub fn managed_roles(principal: &Principal) -> &'static [Role] {
    if principal.is_in_role(Role::Administrator) {
        &[Role::Administrator, Role::ClientAdministrator]
    } else if principal.is_in_role(Role::ClientAdministrator) {
        &[Role::ClientAdministrator]
    } else {
        &[]
    }
}

/// Clamp a requested role set to what the caller may manage. Roles outside
/// the caller's reach are silently dropped, never escalated and never an
/// error.
pub fn sanitize_roles(principal: &Principal, requested: Vec<Role>) -> Vec<Role> {
    let allowed = managed_roles(principal);
    requested
        .into_iter()
        .filter(|role| allowed.contains(role))
        .collect()
}

/// Directory over the account store with visibility scoping applied before
/// any query runs.
pub struct AccountDirectory {
    accounts: Arc<dyn AccountStore>,
}

impl AccountDirectory {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Accounts the principal may see, paginated.
    ///
    /// Administrators see everything; client administrators see their own
    /// client's accounts; anyone else sees an empty page. The fallthrough
    /// is deny, never unrestricted access.
    pub async fn accessible_accounts(
        &self,
        principal: &Principal,
        filter: AccountFilter,
        offset: u32,
        page_size: u32,
    ) -> Result<Vec<Account>, ServiceError> {
        let scoped = match self.scope_filter(principal, filter) {
            Some(filter) => filter,
            None => return Ok(Vec::new()),
        };
        Ok(self.accounts.list(&scoped, offset, page_size).await?)
    }

    /// A single account, subject to the same visibility rules plus
    /// self-access.
    pub async fn get_account(
        &self,
        principal: &Principal,
        account_id: Uuid,
    ) -> Result<Account, ServiceError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if principal.account_id == account.account_id {
            return Ok(account);
        }
        if principal.is_in_role(Role::Administrator) {
            return Ok(account);
        }
        if principal.is_in_role(Role::ClientAdministrator)
            && principal.client_id.is_some()
            && principal.client_id == account.client_id
        {
            return Ok(account);
        }
        Err(ServiceError::AuthorizationFailure)
    }

    /// Administrative account creation. The requested roles are clamped to
    /// the caller's managed set, and client administrators can only create
    /// accounts inside their own client.
    pub async fn create_account(
        &self,
        principal: &Principal,
        req: CreateAccountRequest,
    ) -> Result<Account, ServiceError> {
        req.validate()?;

        if managed_roles(principal).is_empty() {
            return Err(ServiceError::AuthorizationFailure);
        }

        if self.accounts.email_in_use(&req.email).await? {
            return Err(ServiceError::EmailAlreadyUsed);
        }

        let client_id = if principal.is_in_role(Role::Administrator) {
            req.client_id
        } else {
            // Client administrators cannot plant accounts elsewhere.
            principal.client_id
        };

        let mut roles = sanitize_roles(principal, req.roles);
        if roles.is_empty() {
            roles.push(Role::Member);
        }

        let mut account = Account::new(req.email.clone());
        account.roles = roles;
        account.client_id = client_id;
        account.first_name = req.first_name;
        account.last_name = req.last_name;

        self.accounts.create(&account).await.map_err(|e| match e {
            StoreError::Duplicate => ServiceError::EmailAlreadyUsed,
            other => ServiceError::Store(other),
        })?;

        tracing::info!(
            account_id = %account.account_id,
            created_by = %principal.account_id,
            "Account created administratively"
        );
        Ok(account)
    }

    /// Replace an account's role set with the sanitized request.
    pub async fn update_roles(
        &self,
        principal: &Principal,
        account_id: Uuid,
        requested: Vec<Role>,
    ) -> Result<Account, ServiceError> {
        if managed_roles(principal).is_empty() {
            return Err(ServiceError::AuthorizationFailure);
        }

        // Visibility check doubles as the reach check.
        let mut account = self.get_account(principal, account_id).await?;

        let roles = sanitize_roles(principal, requested);
        let roles = if roles.is_empty() {
            vec![Role::Member]
        } else {
            roles
        };

        for _ in 0..3 {
            account.roles = roles.clone();
            match self.accounts.update(&mut account).await {
                Ok(()) => return Ok(account),
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
        Err(ServiceError::Store(StoreError::Conflict))
    }

    /// Apply visibility scoping to a caller-supplied filter. `None` means
    /// the principal sees nothing at all.
    fn scope_filter(&self, principal: &Principal, mut filter: AccountFilter) -> Option<AccountFilter> {
        if principal.is_in_role(Role::Administrator) {
            return Some(filter);
        }
        if principal.is_in_role(Role::ClientAdministrator) {
            // The scoping claim wins over whatever the caller asked for.
            let client_id = principal.client_id?;
            filter.client_id = Some(client_id);
            return Some(filter);
        }
        None
    }
}
