//! Append-only audit log persistence.
//!
//! # Invariants
//! - The trait has no update or delete method; triggers on `audit_entries`
//!   abort any `UPDATE`/`DELETE` issued through raw SQL.
//! - Listing order is `timestamp DESC`, newest insertion first on ties.

use super::{
    ensure_schema_ready, from_epoch_ms, parse_uuid, push_pagination, to_epoch_ms, RepoError,
    RepoResult,
};
use crate::model::attendance::RecordId;
use crate::model::audit::{AuditAction, AuditEntry};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const AUDIT_SELECT_SQL: &str = "SELECT
    id,
    action,
    attendance_id,
    changed_user_name,
    changed_by_name,
    old_value,
    new_value,
    timestamp_ms
FROM audit_entries";

/// Query options for reading the audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditListQuery {
    /// Only entries referring to this record id.
    pub attendance_id: Option<RecordId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Append/read access to the audit log.
pub trait AuditRepository {
    fn append_entry(&self, entry: &AuditEntry) -> RepoResult<()>;
    fn list_entries(&self, query: &AuditListQuery) -> RepoResult<Vec<AuditEntry>>;
}

/// SQLite-backed audit log.
pub struct SqliteAuditRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            "audit_entries",
            &[
                "id",
                "action",
                "attendance_id",
                "changed_user_name",
                "changed_by_name",
                "old_value",
                "new_value",
                "timestamp_ms",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl AuditRepository for SqliteAuditRepository<'_> {
    fn append_entry(&self, entry: &AuditEntry) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO audit_entries (
                id,
                action,
                attendance_id,
                changed_user_name,
                changed_by_name,
                old_value,
                new_value,
                timestamp_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                entry.id.to_string(),
                entry.action.as_str(),
                entry.attendance_id.to_string(),
                entry.changed_user_name.as_str(),
                entry.changed_by_name.as_str(),
                entry.old_value.as_str(),
                entry.new_value.as_str(),
                to_epoch_ms(entry.timestamp),
            ],
        )?;
        Ok(())
    }

    fn list_entries(&self, query: &AuditListQuery) -> RepoResult<Vec<AuditEntry>> {
        let mut sql = format!("{AUDIT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(attendance_id) = query.attendance_id {
            sql.push_str(" AND attendance_id = ?");
            bind_values.push(Value::Text(attendance_id.to_string()));
        }

        sql.push_str(" ORDER BY timestamp_ms DESC, seq DESC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<AuditEntry> {
    let id_text: String = row.get("id")?;
    let attendance_text: String = row.get("attendance_id")?;
    let action_text: String = row.get("action")?;
    let action = AuditAction::parse(&action_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid action `{action_text}` in audit_entries.action"))
    })?;

    Ok(AuditEntry {
        id: parse_uuid(&id_text, "audit_entries.id")?,
        action,
        attendance_id: parse_uuid(&attendance_text, "audit_entries.attendance_id")?,
        changed_user_name: row.get("changed_user_name")?,
        changed_by_name: row.get("changed_by_name")?,
        old_value: row.get("old_value")?,
        new_value: row.get("new_value")?,
        timestamp: from_epoch_ms(row.get("timestamp_ms")?, "audit_entries.timestamp_ms")?,
    })
}
