//! Authorization policy for attendance operations.
//!
//! # Responsibility
//! - Decide, as a pure function, whether an actor may perform an action on a
//!   subject's records.
//! - Derive the listing scope each role is entitled to.
//!
//! # Invariants
//! - Default-deny: every `(action, role)` pair is matched explicitly and any
//!   combination not listed as permitted returns `false`.
//! - The subject role is supplied by the caller from a fresh directory lookup.
//!   `None` means the subject can no longer be resolved; only Admin scope
//!   covers such subjects.

use crate::model::user::{Role, UserId};

/// Authenticated caller of a core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

/// Owner of the records an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub id: UserId,
    /// Current role, or `None` when the subject is unknown to the directory.
    pub role: Option<Role>,
}

/// Operations gated by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read a subject's records or their summary.
    View,
    /// Create today's record for oneself.
    CreateOwn,
    /// Change the status of a record.
    Edit,
    /// Remove a record.
    Delete,
    /// Read the audit log. Subject is ignored.
    ViewAudit,
    /// Read the user directory. Subject is ignored.
    ListUsers,
    /// Read per-subject counts across the actor's scope. Subject is ignored.
    SummarizeTeam,
}

/// Whether `actor` may perform `action` on records owned by `subject`.
pub fn can_act(actor: &Actor, action: Action, subject: Option<&Subject>) -> bool {
    let own = subject.is_some_and(|subject| subject.id == actor.id);
    let subject_is_plain_user = subject.is_some_and(|subject| subject.role == Some(Role::User));

    match (action, actor.role) {
        (Action::View, Role::Admin) => true,
        (Action::View, Role::Manager) => own || subject_is_plain_user,
        (Action::View, Role::User) => own,

        (Action::CreateOwn, Role::Admin | Role::Manager | Role::User) => own,

        (Action::Edit | Action::Delete, Role::Admin) => subject.is_some(),
        (Action::Edit | Action::Delete, Role::Manager) => subject_is_plain_user,
        (Action::Edit | Action::Delete, Role::User) => false,

        (Action::ViewAudit, Role::Admin) => true,
        (Action::ViewAudit, Role::Manager | Role::User) => false,

        (Action::ListUsers | Action::SummarizeTeam, Role::Admin | Role::Manager) => true,
        (Action::ListUsers | Action::SummarizeTeam, Role::User) => false,
    }
}

/// Records an actor sees when listing attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewScope {
    /// Every record in the ledger.
    Everyone,
    /// Records of subjects currently holding this role.
    SubjectsWithRole(Role),
    /// Only the actor's own records.
    OwnOnly(UserId),
}

/// Listing scope for `actor`.
///
/// A Manager's listing covers plain users only, so a Manager's own records do
/// not appear in it even though `Action::View` permits reading them directly.
pub fn view_scope(actor: &Actor) -> ViewScope {
    match actor.role {
        Role::Admin => ViewScope::Everyone,
        Role::Manager => ViewScope::SubjectsWithRole(Role::User),
        Role::User => ViewScope::OwnOnly(actor.id),
    }
}

/// Directory entries an actor sees, or `None` when listing users is denied.
pub fn user_scope(actor: &Actor) -> Option<Option<Role>> {
    if !can_act(actor, Action::ListUsers, None) {
        return None;
    }
    match actor.role {
        Role::Admin => Some(None),
        Role::Manager => Some(Some(Role::User)),
        Role::User => None,
    }
}
