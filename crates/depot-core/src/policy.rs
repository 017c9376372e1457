//! # Access Policy
//!
//! One capability check, `{actor role, action, entity} -> Decision`, used by
//! the ledger wherever a role decides what happens. Cancellation is the only
//! gated action today: roles that need approval get their cancel downgraded
//! to a Pending request.

use serde::{Deserialize, Serialize};

use crate::types::{Actor, Role};

/// What the actor is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update,
    Cancel,
    Delete,
}

/// What the action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Order,
    OrderItem,
    PurchaseExpense,
    PurchaseSupplier,
    Performa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RequireApproval,
}

/// Policy seam between the ledger and the caller's role model.
pub trait AccessPolicy {
    fn check(&self, actor: &Actor, action: Action, entity: EntityKind) -> Decision;
}

/// Default policy: cancellations by the listed roles need approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    approval_roles: Vec<Role>,
}

impl RolePolicy {
    pub fn new(approval_roles: Vec<Role>) -> Self {
        Self { approval_roles }
    }

    pub fn approval_roles(&self) -> &[Role] {
        &self.approval_roles
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::new(vec![Role::Salesman, Role::SalesManager])
    }
}

impl AccessPolicy for RolePolicy {
    fn check(&self, actor: &Actor, action: Action, _entity: EntityKind) -> Decision {
        match action {
            Action::Cancel if self.approval_roles.contains(&actor.role) => {
                Decision::RequireApproval
            }
            _ => Decision::Allow,
        }
    }
}
