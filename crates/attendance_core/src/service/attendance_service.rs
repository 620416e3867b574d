//! Attendance use-case service.
//!
//! # Responsibility
//! - Self-marking, role-scoped listing, edit and delete of attendance records.
//! - Pair every successful edit/delete with one audit entry.
//! - Per-subject and per-team present/absent counts.
//!
//! # Invariants
//! - Subject role is resolved fresh from the directory on every edit, delete
//!   and summary; record name snapshots are never used for authorization.
//! - Edit order: not-found, then authorization, then status validation.
//! - Delete appends the audit entry before removing the record.
//! - Mutation and audit append are two sequential writes without a shared
//!   transaction.
//! - If another writer removes the record between the `DELETE` audit append
//!   and the row delete, the entry stays and the caller gets `RecordNotFound`.

use super::ServiceError;
use crate::clock::Clock;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, RecordId};
use crate::model::audit::{AuditEntry, UNKNOWN_NAME};
use crate::model::time::{TimeWindow, YearMonth};
use crate::model::user::{User, UserId};
use crate::policy::{can_act, view_scope, Action, Actor, Subject, ViewScope};
use crate::repo::{
    AttendanceFilter, AttendanceListQuery, AttendanceRepository, AuditListQuery, AuditRepository,
    RepoError, UserRepository,
};
use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Caller options for [`AttendanceService::list_attendance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceListRequest {
    /// Restrict to one calendar month in the clock's offset.
    pub month: Option<YearMonth>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Present/absent counts for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub subject_id: UserId,
    pub subject_name: String,
    pub present: u32,
    pub absent: u32,
}

impl AttendanceSummary {
    fn empty(subject_id: UserId, subject_name: impl Into<String>) -> Self {
        Self {
            subject_id,
            subject_name: subject_name.into(),
            present: 0,
            absent: 0,
        }
    }

    fn count(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }
}

/// Attendance service facade over directory, ledger and audit repositories.
pub struct AttendanceService<U, L, A, C>
where
    U: UserRepository,
    L: AttendanceRepository,
    A: AuditRepository,
    C: Clock,
{
    users: U,
    ledger: L,
    audit: A,
    clock: C,
}

impl<U, L, A, C> AttendanceService<U, L, A, C>
where
    U: UserRepository,
    L: AttendanceRepository,
    A: AuditRepository,
    C: Clock,
{
    pub fn new(users: U, ledger: L, audit: A, clock: C) -> Self {
        Self {
            users,
            ledger,
            audit,
            clock,
        }
    }

    /// Creates today's `Present` record for the actor.
    ///
    /// # Errors
    /// - `AlreadyMarked` when a record already exists for the actor's current
    ///   local day, including when a concurrent insert wins the unique key.
    /// - `UserNotFound` when the actor is missing from the directory.
    pub fn mark_attendance(&self, actor: &Actor) -> Result<AttendanceRecord, ServiceError> {
        let started_at = Instant::now();
        let result = self.mark_attendance_inner(actor);
        log_outcome("attendance_mark", actor, started_at, &result);
        result
    }

    fn mark_attendance_inner(&self, actor: &Actor) -> Result<AttendanceRecord, ServiceError> {
        let own = Subject {
            id: actor.id,
            role: Some(actor.role),
        };
        authorize(actor, Action::CreateOwn, Some(&own))?;

        let subject = self
            .users
            .resolve_user(actor.id)?
            .ok_or(ServiceError::UserNotFound(actor.id))?;

        let now = self.clock.now();
        if let Some(existing) = self.ledger.find_for_day(subject.id, now.date_naive())? {
            return Err(ServiceError::AlreadyMarked {
                record_id: Some(existing.id),
            });
        }

        let record = AttendanceRecord::self_marked(&subject, now);
        match self.ledger.insert_record(&record) {
            Ok(()) => Ok(record),
            Err(RepoError::Conflict(_)) => Err(ServiceError::AlreadyMarked { record_id: None }),
            Err(err) => Err(err.into()),
        }
    }

    /// Lists the records the actor's role entitles them to, newest first.
    pub fn list_attendance(
        &self,
        actor: &Actor,
        request: &AttendanceListRequest,
    ) -> Result<Vec<AttendanceRecord>, ServiceError> {
        let started_at = Instant::now();
        let result = self.visible_filter(actor).and_then(|filter| {
            let query = AttendanceListQuery {
                filter,
                window: request.month.map(|month| self.month_window(month)),
                limit: request.limit,
                offset: request.offset,
            };
            self.ledger
                .list_records(&query)
                .map_err(ServiceError::from)
        });
        log_outcome("attendance_list", actor, started_at, &result);
        result
    }

    /// Sets a record's status and appends an `EDIT` audit entry.
    ///
    /// The entry is written even when the new status equals the old one.
    pub fn edit_attendance(
        &self,
        actor: &Actor,
        record_id: RecordId,
        new_status: &str,
    ) -> Result<AttendanceRecord, ServiceError> {
        let started_at = Instant::now();
        let result = self.edit_attendance_inner(actor, record_id, new_status);
        log_outcome("attendance_edit", actor, started_at, &result);
        result
    }

    fn edit_attendance_inner(
        &self,
        actor: &Actor,
        record_id: RecordId,
        new_status: &str,
    ) -> Result<AttendanceRecord, ServiceError> {
        let (mut record, subject_user) = self.load_for_mutation(actor, record_id, Action::Edit)?;
        let status = new_status.parse::<AttendanceStatus>()?;

        let previous = record.apply_status(status);
        self.ledger.update_record(&record)?;

        let entry = AuditEntry::edit(
            record.id,
            display_name(subject_user.as_ref()),
            self.actor_name(actor)?,
            previous,
            status,
            self.clock.now().with_timezone(&Utc),
        );
        self.audit.append_entry(&entry)?;
        Ok(record)
    }

    /// Appends a `DELETE` audit entry, then removes the record.
    ///
    /// Returns the record as it was before removal.
    pub fn delete_attendance(
        &self,
        actor: &Actor,
        record_id: RecordId,
    ) -> Result<AttendanceRecord, ServiceError> {
        let started_at = Instant::now();
        let result = self.delete_attendance_inner(actor, record_id);
        log_outcome("attendance_delete", actor, started_at, &result);
        result
    }

    fn delete_attendance_inner(
        &self,
        actor: &Actor,
        record_id: RecordId,
    ) -> Result<AttendanceRecord, ServiceError> {
        let (record, subject_user) = self.load_for_mutation(actor, record_id, Action::Delete)?;

        let entry = AuditEntry::deletion(
            record.id,
            display_name(subject_user.as_ref()),
            self.actor_name(actor)?,
            record.status,
            self.clock.now().with_timezone(&Utc),
        );
        self.audit.append_entry(&entry)?;

        if !self.ledger.delete_by_id(record.id)? {
            warn!(
                "event=attendance_delete module=service status=orphaned_audit record_id={} audit_id={}",
                record.id, entry.id
            );
            return Err(ServiceError::RecordNotFound(record.id));
        }
        Ok(record)
    }

    /// Reads the audit log, newest first. Admin only.
    pub fn list_audit(
        &self,
        actor: &Actor,
        query: &AuditListQuery,
    ) -> Result<Vec<AuditEntry>, ServiceError> {
        let started_at = Instant::now();
        let result = authorize(actor, Action::ViewAudit, None)
            .and_then(|()| self.audit.list_entries(query).map_err(ServiceError::from));
        log_outcome("audit_list", actor, started_at, &result);
        result
    }

    /// Present/absent counts for one subject the actor may view.
    pub fn summarize_subject(
        &self,
        actor: &Actor,
        subject_id: UserId,
        month: Option<YearMonth>,
    ) -> Result<AttendanceSummary, ServiceError> {
        let started_at = Instant::now();
        let result = self.summarize_subject_inner(actor, subject_id, month);
        log_outcome("summary_subject", actor, started_at, &result);
        result
    }

    fn summarize_subject_inner(
        &self,
        actor: &Actor,
        subject_id: UserId,
        month: Option<YearMonth>,
    ) -> Result<AttendanceSummary, ServiceError> {
        let subject_user = self.users.resolve_user(subject_id)?;
        let subject = Subject {
            id: subject_id,
            role: subject_user.as_ref().map(|user| user.role),
        };
        authorize(actor, Action::View, Some(&subject))?;

        let records = self.ledger.list_records(&AttendanceListQuery {
            filter: AttendanceFilter::Subjects(vec![subject_id]),
            window: month.map(|month| self.month_window(month)),
            ..AttendanceListQuery::default()
        })?;

        let name = match (&subject_user, records.first()) {
            (Some(user), _) => user.name.clone(),
            (None, Some(record)) => record.subject_name.clone(),
            (None, None) => return Err(ServiceError::UserNotFound(subject_id)),
        };

        let mut summary = AttendanceSummary::empty(subject_id, name);
        for record in &records {
            summary.count(record.status);
        }
        Ok(summary)
    }

    /// One summary per subject in the actor's listing scope, ordered by name
    /// then id. Admin and Manager only.
    pub fn summarize_team(
        &self,
        actor: &Actor,
        month: Option<YearMonth>,
    ) -> Result<Vec<AttendanceSummary>, ServiceError> {
        let started_at = Instant::now();
        let result = self.summarize_team_inner(actor, month);
        log_outcome("summary_team", actor, started_at, &result);
        result
    }

    fn summarize_team_inner(
        &self,
        actor: &Actor,
        month: Option<YearMonth>,
    ) -> Result<Vec<AttendanceSummary>, ServiceError> {
        authorize(actor, Action::SummarizeTeam, None)?;

        let (subjects, filter) = self.visible_subjects(actor)?;
        let mut by_subject: BTreeMap<UserId, AttendanceSummary> = subjects
            .into_iter()
            .map(|user| (user.id, AttendanceSummary::empty(user.id, user.name)))
            .collect();

        let records = self.ledger.list_records(&AttendanceListQuery {
            filter,
            window: month.map(|month| self.month_window(month)),
            ..AttendanceListQuery::default()
        })?;
        for record in records {
            by_subject
                .entry(record.subject_id)
                .or_insert_with(|| {
                    AttendanceSummary::empty(record.subject_id, record.subject_name.as_str())
                })
                .count(record.status);
        }

        let mut summaries: Vec<AttendanceSummary> = by_subject.into_values().collect();
        summaries.sort_by(|left, right| {
            left.subject_name
                .cmp(&right.subject_name)
                .then(left.subject_id.cmp(&right.subject_id))
        });
        Ok(summaries)
    }

    /// Loads a record and its subject, then authorizes `action` against the
    /// subject's current role.
    fn load_for_mutation(
        &self,
        actor: &Actor,
        record_id: RecordId,
        action: Action,
    ) -> Result<(AttendanceRecord, Option<User>), ServiceError> {
        let record = self
            .ledger
            .find_by_id(record_id)?
            .ok_or(ServiceError::RecordNotFound(record_id))?;
        let subject_user = self.users.resolve_user(record.subject_id)?;
        let subject = Subject {
            id: record.subject_id,
            role: subject_user.as_ref().map(|user| user.role),
        };
        authorize(actor, action, Some(&subject))?;
        Ok((record, subject_user))
    }

    fn actor_name(&self, actor: &Actor) -> Result<String, ServiceError> {
        Ok(display_name(self.users.resolve_user(actor.id)?.as_ref()))
    }

    fn visible_filter(&self, actor: &Actor) -> Result<AttendanceFilter, ServiceError> {
        Ok(match view_scope(actor) {
            ViewScope::Everyone => AttendanceFilter::All,
            ViewScope::SubjectsWithRole(role) => AttendanceFilter::Subjects(
                self.users
                    .list_users(Some(role))?
                    .into_iter()
                    .map(|user| user.id)
                    .collect(),
            ),
            ViewScope::OwnOnly(id) => AttendanceFilter::Subjects(vec![id]),
        })
    }

    fn visible_subjects(
        &self,
        actor: &Actor,
    ) -> Result<(Vec<User>, AttendanceFilter), ServiceError> {
        Ok(match view_scope(actor) {
            ViewScope::Everyone => (self.users.list_users(None)?, AttendanceFilter::All),
            ViewScope::SubjectsWithRole(role) => {
                let users = self.users.list_users(Some(role))?;
                let ids = users.iter().map(|user| user.id).collect();
                (users, AttendanceFilter::Subjects(ids))
            }
            ViewScope::OwnOnly(id) => (
                self.users.resolve_user(id)?.into_iter().collect(),
                AttendanceFilter::Subjects(vec![id]),
            ),
        })
    }

    fn month_window(&self, month: YearMonth) -> TimeWindow {
        TimeWindow::month(month, *self.clock.now().offset())
    }
}

fn authorize(actor: &Actor, action: Action, subject: Option<&Subject>) -> Result<(), ServiceError> {
    if can_act(actor, action, subject) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden { action })
    }
}

fn display_name(user: Option<&User>) -> String {
    user.map_or_else(|| UNKNOWN_NAME.to_string(), |user| user.name.clone())
}

pub(super) fn log_outcome<T>(
    event: &'static str,
    actor: &Actor,
    started_at: Instant,
    result: &Result<T, ServiceError>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => info!(
            "event={event} module=service status=ok actor_id={} role={} duration_ms={duration_ms}",
            actor.id, actor.role
        ),
        Err(ServiceError::Forbidden { action }) => warn!(
            "event={event} module=service status=denied actor_id={} role={} action={action:?} duration_ms={duration_ms}",
            actor.id, actor.role
        ),
        Err(ServiceError::Storage(err)) => error!(
            "event={event} module=service status=error actor_id={} error_code=storage_failure duration_ms={duration_ms} error={err}",
            actor.id
        ),
        Err(err) => info!(
            "event={event} module=service status=error actor_id={} error_code={} duration_ms={duration_ms}",
            actor.id,
            err.kind().as_str()
        ),
    }
}
