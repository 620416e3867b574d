//! User directory use-cases: registration, profile and role-scoped listing.
//!
//! # Invariants
//! - Registration defaults the role to `User`.
//! - Email uniqueness is checked case-insensitively before insert and again
//!   by the store's unique key.

use super::attendance_service::log_outcome;
use super::ServiceError;
use crate::model::user::{Role, User, UserId};
use crate::policy::{user_scope, Action, Actor};
use crate::repo::{RepoError, UserRepository};
use log::info;
use std::time::Instant;

/// Input for [`UserService::register_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    /// Defaults to [`Role::User`].
    pub role: Option<Role>,
}

/// User directory service.
pub struct UserService<U: UserRepository> {
    users: U,
}

impl<U: UserRepository> UserService<U> {
    pub fn new(users: U) -> Self {
        Self { users }
    }

    /// Adds a user to the directory.
    ///
    /// # Errors
    /// - `InvalidInput` for a blank name, blank email or malformed email.
    /// - `DuplicateEmail` when the email is taken, ignoring case.
    pub fn register_user(&self, request: RegisterUserRequest) -> Result<User, ServiceError> {
        let started_at = Instant::now();
        let user = User::new(
            request.name,
            request.email,
            request.role.unwrap_or(Role::User),
        )?;

        if self.users.find_by_email(&user.email)?.is_some() {
            return Err(ServiceError::DuplicateEmail(user.email));
        }
        match self.users.insert_user(&user) {
            Ok(()) => {}
            Err(RepoError::Conflict(_)) => return Err(ServiceError::DuplicateEmail(user.email)),
            Err(err) => return Err(err.into()),
        }

        info!(
            "event=user_register module=service status=ok user_id={} role={} duration_ms={}",
            user.id,
            user.role,
            started_at.elapsed().as_millis()
        );
        Ok(user)
    }

    /// The actor's own directory entry.
    pub fn profile(&self, actor: &Actor) -> Result<User, ServiceError> {
        self.users
            .resolve_user(actor.id)?
            .ok_or(ServiceError::UserNotFound(actor.id))
    }

    /// Directory entries visible to the actor, ordered by name then id.
    pub fn list_users(&self, actor: &Actor) -> Result<Vec<User>, ServiceError> {
        let started_at = Instant::now();
        let result = match user_scope(actor) {
            Some(role) => self.users.list_users(role).map_err(ServiceError::from),
            None => Err(ServiceError::Forbidden {
                action: Action::ListUsers,
            }),
        };
        log_outcome("user_list", actor, started_at, &result);
        result
    }

    /// Resolves an already-authenticated user id into an [`Actor`].
    ///
    /// The role comes from the directory, never from the caller.
    pub fn resolve_actor(&self, id: UserId) -> Result<Actor, ServiceError> {
        let user = self
            .users
            .resolve_user(id)?
            .ok_or(ServiceError::UserNotFound(id))?;
        Ok(Actor::new(user.id, user.role))
    }
}
