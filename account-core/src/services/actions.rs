//! Action authorization engine.
//!
//! Providers declare which entity kinds they understand and which actions
//! a principal may perform on them; the catalog concatenates and orders
//! the results. An action id appearing in the computed list is the only
//! thing that makes an operation allowed.

use crate::models::{Account, Client, ErrorRecord, Principal, Role};
use serde::Serialize;
use uuid::Uuid;

/// Closed set of entity kinds actions can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Client,
    ErrorEntry,
}

/// An entity actions can be computed for.
pub trait Actionable {
    fn kind(&self) -> EntityKind;

    /// Key used to address the entity in action routes.
    fn entity_key(&self) -> Option<String>;

    /// Owning account, when the entity declares one. Edit and delete are
    /// additionally gated on ownership for such entities.
    fn owner(&self) -> Option<Uuid> {
        None
    }
}

impl Actionable for Account {
    fn kind(&self) -> EntityKind {
        EntityKind::Account
    }

    fn entity_key(&self) -> Option<String> {
        Some(self.account_id.to_string())
    }
}

impl Actionable for Client {
    fn kind(&self) -> EntityKind {
        EntityKind::Client
    }

    fn entity_key(&self) -> Option<String> {
        Some(self.client_id.to_string())
    }
}

impl Actionable for ErrorRecord {
    fn kind(&self) -> EntityKind {
        EntityKind::ErrorEntry
    }

    fn entity_key(&self) -> Option<String> {
        Some(self.error_id.to_string())
    }
}

/// Target of an action computation: a concrete entity, or just a kind for
/// operations like "create" that have no instance yet.
#[derive(Clone, Copy)]
pub enum ActionTarget<'a> {
    Kind(EntityKind),
    Entity(&'a dyn Actionable),
}

impl ActionTarget<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            ActionTarget::Kind(kind) => *kind,
            ActionTarget::Entity(entity) => entity.kind(),
        }
    }
}

/// Description of one permitted action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionDescription {
    /// Stable id, e.g. "common.edit".
    pub id: String,
    /// Display text.
    pub text: String,
    pub sort_order: i32,
    /// Key of the entity the action applies to; absent for operations that
    /// are not tied to an instance (create).
    pub target_key: Option<String>,
}

/// A source of actions for one or more entity kinds.
pub trait ActionProvider: Send + Sync {
    fn supports(&self, kind: EntityKind) -> bool;

    fn actions(&self, principal: &Principal, target: &ActionTarget<'_>) -> Vec<ActionDescription>;
}

/// Registry of action providers.
#[derive(Default)]
pub struct ActionCatalog {
    providers: Vec<Box<dyn ActionProvider>>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn ActionProvider>) {
        self.providers.push(provider);
    }

    /// Actions every matching provider yields for the target, stable-sorted
    /// by declared sort order so equal orders keep registration order.
    pub fn actions_for(
        &self,
        principal: &Principal,
        target: &ActionTarget<'_>,
    ) -> Vec<ActionDescription> {
        let kind = target.kind();
        let mut actions: Vec<ActionDescription> = self
            .providers
            .iter()
            .filter(|provider| provider.supports(kind))
            .flat_map(|provider| provider.actions(principal, target))
            .collect();
        actions.sort_by_key(|action| action.sort_order);
        actions
    }

    /// An operation is allowed iff its id appears in the computed list.
    pub fn is_operation_allowed(
        &self,
        principal: &Principal,
        action_id: &str,
        target: &ActionTarget<'_>,
    ) -> bool {
        self.actions_for(principal, target)
            .iter()
            .any(|action| action.id == action_id)
    }
}

/// Generic provider for entity editing: create / edit / delete, gated on
/// role membership, with edit and delete additionally gated on ownership
/// when the entity declares an owner.
pub struct GenericEditActionProvider {
    kind: EntityKind,
    roles: Vec<Role>,
    create_title: String,
    edit_title: String,
    delete_title: String,
}

impl GenericEditActionProvider {
    pub fn new(kind: EntityKind, roles: Vec<Role>) -> Self {
        Self {
            kind,
            roles,
            create_title: "Create".to_string(),
            edit_title: "Edit".to_string(),
            delete_title: "Delete".to_string(),
        }
    }

    pub fn with_titles(
        mut self,
        create_title: impl Into<String>,
        edit_title: impl Into<String>,
        delete_title: impl Into<String>,
    ) -> Self {
        self.create_title = create_title.into();
        self.edit_title = edit_title.into();
        self.delete_title = delete_title.into();
        self
    }

    fn in_allowed_role(&self, principal: &Principal) -> bool {
        self.roles.iter().any(|role| principal.is_in_role(*role))
    }
}

impl ActionProvider for GenericEditActionProvider {
    fn supports(&self, kind: EntityKind) -> bool {
        kind == self.kind
    }

    fn actions(&self, principal: &Principal, target: &ActionTarget<'_>) -> Vec<ActionDescription> {
        let is_allowed = self.in_allowed_role(principal);
        let mut actions = Vec::new();
        if is_allowed {
            actions.push(ActionDescription {
                id: "common.create".to_string(),
                text: self.create_title.clone(),
                sort_order: 10,
                target_key: None,
            });
        }

        let entity = match target {
            ActionTarget::Entity(entity) => entity,
            ActionTarget::Kind(_) => return actions,
        };

        // Ownership gates the instance operations regardless of role.
        let mut is_allowed_edit = is_allowed;
        if let Some(owner) = entity.owner() {
            is_allowed_edit &= owner == principal.account_id;
        }

        if is_allowed_edit {
            actions.push(ActionDescription {
                id: "common.edit".to_string(),
                text: self.edit_title.clone(),
                sort_order: 10,
                target_key: entity.entity_key(),
            });
            actions.push(ActionDescription {
                id: "common.delete".to_string(),
                text: self.delete_title.clone(),
                sort_order: 20,
                target_key: entity.entity_key(),
            });
        }
        actions
    }
}

/// Generic provider for a read-only detail action.
pub struct GenericDetailActionProvider {
    kind: EntityKind,
    roles: Vec<Role>,
    title: String,
}

impl GenericDetailActionProvider {
    pub fn new(kind: EntityKind, roles: Vec<Role>) -> Self {
        Self {
            kind,
            roles,
            title: "Details".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl ActionProvider for GenericDetailActionProvider {
    fn supports(&self, kind: EntityKind) -> bool {
        kind == self.kind
    }

    fn actions(&self, principal: &Principal, target: &ActionTarget<'_>) -> Vec<ActionDescription> {
        let entity = match target {
            ActionTarget::Entity(entity) => entity,
            ActionTarget::Kind(_) => return Vec::new(),
        };
        if !self.roles.iter().any(|role| principal.is_in_role(*role)) {
            return Vec::new();
        }
        vec![ActionDescription {
            id: "common.details".to_string(),
            text: self.title.clone(),
            sort_order: 5,
            target_key: entity.entity_key(),
        }]
    }
}
