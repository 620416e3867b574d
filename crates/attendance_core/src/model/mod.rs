//! Domain model for users, attendance records and audit entries.
//!
//! # Responsibility
//! - Define canonical data structures used by policy, repositories and services.
//! - Validate field-level invariants at construction and parse boundaries.
//!
//! # Invariants
//! - Every persisted object is identified by a stable, non-nil `Uuid`.
//! - Display names copied onto records and audit entries are write-time
//!   snapshots and are never re-resolved.
//! - Timestamps are UTC instants; calendar days are derived in a caller
//!   supplied offset.

pub mod attendance;
pub mod audit;
pub mod time;
pub mod user;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation and parse errors for domain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Identifier is the nil UUID.
    NilId,
    /// Display name is blank after trim.
    BlankName,
    /// Email is blank after trim.
    BlankEmail,
    /// Email does not look like `local@domain`.
    InvalidEmail(String),
    /// Role string is not one of `Admin|Manager|User`.
    UnknownRole(String),
    /// Status string is not one of `Present|Absent`.
    UnknownStatus(String),
    /// Month string is not `YYYY-MM` or names a non-existent month.
    InvalidMonth(String),
    /// UTC offset string is not `+HH:MM`/`-HH:MM`.
    InvalidUtcOffset(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "identifier must not be nil"),
            Self::BlankName => write!(f, "name must not be blank"),
            Self::BlankEmail => write!(f, "email must not be blank"),
            Self::InvalidEmail(value) => write!(f, "email is invalid: `{value}`"),
            Self::UnknownRole(value) => {
                write!(f, "unknown role `{value}`; expected Admin|Manager|User")
            }
            Self::UnknownStatus(value) => {
                write!(f, "unknown status `{value}`; expected Present|Absent")
            }
            Self::InvalidMonth(value) => write!(f, "month is invalid: `{value}` (expected YYYY-MM)"),
            Self::InvalidUtcOffset(value) => {
                write!(f, "utc offset is invalid: `{value}` (expected +HH:MM or -HH:MM)")
            }
        }
    }
}

impl Error for ModelError {}
