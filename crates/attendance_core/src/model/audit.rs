//! Audit log entry model.
//!
//! # Invariants
//! - Entries are immutable once appended and are never deleted.
//! - `attendance_id` is a non-owning back-reference; it keeps pointing at a
//!   record id after that record has been deleted.
//! - Actor and subject names are resolved when the mutation happens.

use super::attendance::{AttendanceStatus, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an audit entry.
pub type AuditId = Uuid;

/// `new_value` written for deletions.
pub const DELETED_VALUE: &str = "Deleted";

/// Name written when the actor or subject can no longer be resolved.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Mutation kind recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Edit,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "EDIT",
            Self::Delete => "DELETE",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "EDIT" => Some(Self::Edit),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one edit or deletion of an attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub action: AuditAction,
    pub attendance_id: RecordId,
    /// Subject whose record changed.
    pub changed_user_name: String,
    /// Actor who made the change.
    pub changed_by_name: String,
    pub old_value: String,
    pub new_value: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry for a status edit. `old == new` is still recorded.
    pub fn edit(
        attendance_id: RecordId,
        changed_user_name: impl Into<String>,
        changed_by_name: impl Into<String>,
        old: AttendanceStatus,
        new: AttendanceStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: AuditAction::Edit,
            attendance_id,
            changed_user_name: changed_user_name.into(),
            changed_by_name: changed_by_name.into(),
            old_value: old.as_str().to_string(),
            new_value: new.as_str().to_string(),
            timestamp,
        }
    }

    /// Entry for a deletion; `new_value` is always [`DELETED_VALUE`].
    pub fn deletion(
        attendance_id: RecordId,
        changed_user_name: impl Into<String>,
        changed_by_name: impl Into<String>,
        old: AttendanceStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: AuditAction::Delete,
            attendance_id,
            changed_user_name: changed_user_name.into(),
            changed_by_name: changed_by_name.into(),
            old_value: old.as_str().to_string(),
            new_value: DELETED_VALUE.to_string(),
            timestamp,
        }
    }
}
