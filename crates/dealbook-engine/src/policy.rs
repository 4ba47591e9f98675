//! Role-table policy gate.
//!
//! Users are assigned one [`Role`]; each role holds a set of [`Action`]s,
//! seeded from [`Role::default_actions`] and adjustable at runtime.

use std::collections::{BTreeSet, HashMap};

use dealbook_types::{Action, EntityRef, Role, UserId};
use parking_lot::RwLock;
use tracing::debug;

use crate::ports::PolicyGate;

#[derive(Debug)]
pub struct RolePolicy {
    roles: RwLock<HashMap<UserId, Role>>,
    grants: RwLock<HashMap<Role, BTreeSet<Action>>>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RolePolicy {
    /// A policy with the default grants and no users.
    #[must_use]
    pub fn new() -> Self {
        let grants = [Role::Admin, Role::Entrepreneur, Role::Supplier, Role::Investor]
            .into_iter()
            .map(|role| (role, role.default_actions().iter().copied().collect()))
            .collect();
        Self {
            roles: RwLock::new(HashMap::new()),
            grants: RwLock::new(grants),
        }
    }

    pub fn assign(&self, user: UserId, role: Role) {
        self.roles.write().insert(user, role);
    }

    #[must_use]
    pub fn role_of(&self, user: UserId) -> Option<Role> {
        self.roles.read().get(&user).copied()
    }

    pub fn grant(&self, role: Role, action: Action) {
        self.grants.write().entry(role).or_default().insert(action);
    }

    pub fn revoke(&self, role: Role, action: Action) {
        if let Some(actions) = self.grants.write().get_mut(&role) {
            actions.remove(&action);
        }
    }
}

impl PolicyGate for RolePolicy {
    fn is_authorized(&self, actor: UserId, action: Action, entity: EntityRef) -> bool {
        let Some(role) = self.role_of(actor) else {
            debug!(%actor, %action, %entity, "Actor has no role");
            return false;
        };
        self.grants
            .read()
            .get(&role)
            .is_some_and(|actions| actions.contains(&action))
    }
}
