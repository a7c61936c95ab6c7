//! Role codes and the authenticated principal they attach to.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Role codes recognized by the account layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unrestricted administrator.
    Administrator,
    /// Administrator scoped to a single client.
    ClientAdministrator,
    /// Regular account with no management rights.
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::ClientAdministrator => "client_administrator",
            Role::Member => "member",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "administrator" => Ok(Role::Administrator),
            "client_administrator" => Ok(Role::ClientAdministrator),
            "member" => Ok(Role::Member),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Authenticated caller identity, as asserted by the session layer.
///
/// Carries only the claims this crate consumes: the account key, role
/// membership, and the optional client scope.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: Uuid,
    pub email: String,
    pub roles: HashSet<Role>,
    pub client_id: Option<Uuid>,
}

impl Principal {
    pub fn new(account_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            account_id,
            email: email.into(),
            roles: HashSet::new(),
            client_id: None,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn with_client(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn is_in_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
