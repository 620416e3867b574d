//! Attendance ledger persistence.
//!
//! # Responsibility
//! - Store one record per subject per local day.
//! - Answer day, subject-set and id lookups for the attendance service.
//!
//! # Invariants
//! - `UNIQUE(subject_id, day_key)` backs the one-per-day rule; a violating
//!   insert returns `Conflict("attendance_records.subject_day")`.
//! - List order is `date DESC` with insertion order breaking ties.
//! - `subject_name` is written once at insert and never updated.

use super::{
    ensure_schema_ready, from_epoch_ms, map_unique_violation, parse_uuid, push_pagination,
    to_epoch_ms, RepoError, RepoResult,
};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, RecordId};
use crate::model::time::TimeWindow;
use crate::model::user::UserId;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    subject_id,
    subject_name,
    date_ms,
    day_key,
    status
FROM attendance_records";

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Which subjects a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceFilter {
    /// Every subject.
    All,
    /// Only these subjects. An empty set yields an empty listing.
    Subjects(Vec<UserId>),
}

/// Query options for listing records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceListQuery {
    pub filter: AttendanceFilter,
    /// Restrict to records whose `date` falls in this window.
    pub window: Option<TimeWindow>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Default for AttendanceListQuery {
    fn default() -> Self {
        Self {
            filter: AttendanceFilter::All,
            window: None,
            limit: None,
            offset: 0,
        }
    }
}

/// Repository interface for the attendance ledger.
pub trait AttendanceRepository {
    /// Record counted toward `day` for `subject_id`, if any.
    ///
    /// Matches on the stored day key, the same key the unique constraint uses.
    fn find_for_day(
        &self,
        subject_id: UserId,
        day: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>>;
    fn insert_record(&self, record: &AttendanceRecord) -> RepoResult<()>;
    fn find_by_id(&self, id: RecordId) -> RepoResult<Option<AttendanceRecord>>;
    /// Persists the record's current status. Fails with `NotFound` if absent.
    fn update_record(&self, record: &AttendanceRecord) -> RepoResult<()>;
    /// Removes a record; returns whether a row was deleted.
    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool>;
    fn list_records(&self, query: &AttendanceListQuery) -> RepoResult<Vec<AttendanceRecord>>;
}

/// SQLite-backed attendance ledger.
pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            "attendance_records",
            &[
                "id",
                "subject_id",
                "subject_name",
                "date_ms",
                "day_key",
                "status",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn find_for_day(
        &self,
        subject_id: UserId,
        day: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL} WHERE subject_id = ?1 AND day_key = ?2;"
        ))?;
        let row = stmt
            .query_row(
                params![
                    subject_id.to_string(),
                    day.format(DAY_KEY_FORMAT).to_string(),
                ],
                |row| Ok(parse_record_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn insert_record(&self, record: &AttendanceRecord) -> RepoResult<()> {
        record
            .validate()
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO attendance_records (
                    id,
                    subject_id,
                    subject_name,
                    date_ms,
                    day_key,
                    status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    record.id.to_string(),
                    record.subject_id.to_string(),
                    record.subject_name.as_str(),
                    to_epoch_ms(record.date),
                    record.day.format(DAY_KEY_FORMAT).to_string(),
                    record.status.as_str(),
                ],
            )
            .map_err(|err| map_unique_violation(err, "attendance_records.subject_day"))?;
        Ok(())
    }

    fn find_by_id(&self, id: RecordId) -> RepoResult<Option<AttendanceRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RECORD_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(parse_record_row(row)))
            .optional()?;
        row.transpose()
    }

    fn update_record(&self, record: &AttendanceRecord) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE attendance_records SET status = ?1 WHERE id = ?2;",
            params![record.status.as_str(), record.id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(record.id));
        }
        Ok(())
    }

    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM attendance_records WHERE id = ?1;",
            [id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn list_records(&self, query: &AttendanceListQuery) -> RepoResult<Vec<AttendanceRecord>> {
        let mut sql = format!("{RECORD_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let AttendanceFilter::Subjects(subject_ids) = &query.filter {
            if subject_ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; subject_ids.len()].join(", ");
            sql.push_str(&format!(" AND subject_id IN ({placeholders})"));
            bind_values.extend(
                subject_ids
                    .iter()
                    .map(|id| Value::Text(id.to_string())),
            );
        }

        if let Some(window) = &query.window {
            sql.push_str(" AND date_ms >= ? AND date_ms < ?");
            bind_values.push(Value::Integer(to_epoch_ms(window.start)));
            bind_values.push(Value::Integer(to_epoch_ms(window.end)));
        }

        sql.push_str(" ORDER BY date_ms DESC, seq ASC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    let id_text: String = row.get("id")?;
    let subject_text: String = row.get("subject_id")?;

    let day_text: String = row.get("day_key")?;
    let day = NaiveDate::parse_from_str(&day_text, DAY_KEY_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid day `{day_text}` in attendance_records.day_key"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = status_text.parse::<AttendanceStatus>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in attendance_records.status"
        ))
    })?;

    Ok(AttendanceRecord {
        id: parse_uuid(&id_text, "attendance_records.id")?,
        subject_id: parse_uuid(&subject_text, "attendance_records.subject_id")?,
        subject_name: row.get("subject_name")?,
        date: from_epoch_ms(row.get("date_ms")?, "attendance_records.date_ms")?,
        day,
        status,
    })
}
