//! Attendance ledger record.
//!
//! # Responsibility
//! - Define the one-per-subject-per-day presence record.
//! - Own the `Present <-> Absent` status transition.
//!
//! # Invariants
//! - A self-marked record always starts as `Present`.
//! - `subject_name` is the subject's display name at mark time and is never
//!   refreshed afterwards.
//! - `day` is the local calendar day `date` falls on when the record was made.

use super::user::{User, UserId};
use super::ModelError;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of an attendance record.
pub type RecordId = Uuid;

/// Presence status. No other categories exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    /// Canonical storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
        }
    }

    /// The other allowed value.
    pub fn toggled(self) -> Self {
        match self {
            Self::Present => Self::Absent,
            Self::Absent => Self::Present,
        }
    }
}

impl Display for AttendanceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = ModelError;

    /// Accepts the canonical names only; case and padding are not normalized.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Present" => Ok(Self::Present),
            "Absent" => Ok(Self::Absent),
            _ => Err(ModelError::UnknownStatus(value.to_string())),
        }
    }
}

/// One subject's attendance for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub subject_id: UserId,
    /// Display-name snapshot taken when the record was created.
    pub subject_name: String,
    /// Instant the record was marked.
    pub date: DateTime<Utc>,
    /// Local calendar day the record counts toward.
    pub day: NaiveDate,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    /// Builds the record a subject creates for themselves at `at`.
    ///
    /// The status is always `Present`; no caller can self-mark absence.
    pub fn self_marked(subject: &User, at: DateTime<FixedOffset>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject.id,
            subject_name: subject.name.clone(),
            date: at.with_timezone(&Utc),
            day: at.date_naive(),
            status: AttendanceStatus::Present,
        }
    }

    /// Sets a new status and returns the previous one.
    pub fn apply_status(&mut self, status: AttendanceStatus) -> AttendanceStatus {
        std::mem::replace(&mut self.status, status)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.id.is_nil() || self.subject_id.is_nil() {
            return Err(ModelError::NilId);
        }
        Ok(())
    }
}
