//! User directory model.
//!
//! # Responsibility
//! - Define the identity record the core reads role and name from.
//! - Provide the closed `Role` enumeration used by the authorization table.
//!
//! # Invariants
//! - `role` never changes after a user is registered.
//! - `name` and `email` are stored trimmed and non-blank.

use super::ModelError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Stable identifier of a user (actor or subject).
pub type UserId = Uuid;

/// Organization role. Serialized with the canonical `Admin|Manager|User` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Full visibility and mutation rights, sole reader of the audit log.
    Admin,
    /// Manages records of plain users.
    Manager,
    /// Employee; may only self-mark and view own records.
    User,
}

impl Role {
    /// Canonical storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Manager => "Manager",
            Self::User => "User",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "user" | "employee" => Ok(Self::User),
            _ => Err(ModelError::UnknownRole(value.trim().to_string())),
        }
    }
}

/// Identity record owned by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Current display name. Records and audit entries copy it at write time.
    pub name: String,
    /// Registration key, unique case-insensitively.
    pub email: String,
    pub role: Role,
}

impl User {
    /// Creates a user with a generated id after normalizing and validating input.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Result<Self, ModelError> {
        Self::with_id(Uuid::new_v4(), name, email, role)
    }

    /// Creates a user with a caller-provided id.
    ///
    /// # Errors
    /// - `NilId` for `Uuid::nil()`.
    /// - `BlankName`, `BlankEmail` or `InvalidEmail` for bad input.
    pub fn with_id(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Result<Self, ModelError> {
        let user = Self {
            id,
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            role,
        };
        user.validate()?;
        Ok(user)
    }

    /// Checks field-level invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.id.is_nil() {
            return Err(ModelError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(ModelError::BlankName);
        }
        validate_email(&self.email)
    }
}

/// Validates the shape of an email address.
pub fn validate_email(email: &str) -> Result<(), ModelError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(ModelError::BlankEmail);
    }
    if !EMAIL_RE.is_match(trimmed) {
        return Err(ModelError::InvalidEmail(trimmed.to_string()));
    }
    Ok(())
}
