//! Attendance use-case services.
//!
//! # Responsibility
//! - Combine policy decisions with repository calls into the operations
//!   callers invoke.
//! - Translate repository failures into caller-facing error kinds.
//!
//! # Invariants
//! - Every operation authorizes before it writes.
//! - Storage failures propagate unchanged as `Storage`; nothing is retried.

pub mod attendance_service;
pub mod user_service;

use crate::model::attendance::RecordId;
use crate::model::user::UserId;
use crate::model::ModelError;
use crate::policy::Action;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use attendance_service::{AttendanceListRequest, AttendanceService, AttendanceSummary};
pub use user_service::{RegisterUserRequest, UserService};

/// Coarse classification of a [`ServiceError`] for callers that only branch
/// on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyMarked,
    NotFound,
    Forbidden,
    InvalidInput,
    DuplicateEmail,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyMarked => "already_marked",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::InvalidInput => "invalid_input",
            Self::DuplicateEmail => "duplicate_email",
            Self::StorageFailure => "storage_failure",
        }
    }
}

/// Errors returned by service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// The subject already has a record for today.
    AlreadyMarked { record_id: Option<RecordId> },
    /// Target attendance record does not exist.
    RecordNotFound(RecordId),
    /// Actor or subject cannot be resolved in the directory.
    UserNotFound(UserId),
    /// The policy denied the action.
    Forbidden { action: Action },
    /// Caller-supplied value failed validation.
    InvalidInput(String),
    /// Email is already registered.
    DuplicateEmail(String),
    /// Persistence-layer failure.
    Storage(RepoError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyMarked { .. } => ErrorKind::AlreadyMarked,
            Self::RecordNotFound(_) | Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::DuplicateEmail(_) => ErrorKind::DuplicateEmail,
            Self::Storage(_) => ErrorKind::StorageFailure,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyMarked { .. } => write!(f, "attendance already marked for today"),
            Self::RecordNotFound(id) => write!(f, "attendance record not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::Forbidden { action } => write!(f, "forbidden: {action:?} is not permitted"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::DuplicateEmail(email) => write!(f, "user already exists: {email}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::RecordNotFound(id),
            other => Self::Storage(other),
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(value: ModelError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}
