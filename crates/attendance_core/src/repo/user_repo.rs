//! User directory persistence.
//!
//! # Invariants
//! - Email uniqueness is case-insensitive (`COLLATE NOCASE`).
//! - Listing order is deterministic: `name ASC, id ASC`.

use super::{ensure_schema_ready, map_unique_violation, parse_uuid, RepoError, RepoResult};
use crate::model::user::{Role, User, UserId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT id, name, email, role FROM users";

/// Read/write access to the user directory.
pub trait UserRepository {
    /// Inserts a new user. A duplicate email yields `Conflict("users.email")`.
    fn insert_user(&self, user: &User) -> RepoResult<()>;
    /// Looks up the current state of one user.
    fn resolve_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Case-insensitive lookup by email.
    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Lists users, optionally restricted to one role.
    fn list_users(&self, role: Option<Role>) -> RepoResult<Vec<User>>;
}

/// SQLite-backed user directory.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, "users", &["id", "name", "email", "role"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn insert_user(&self, user: &User) -> RepoResult<()> {
        user.validate()
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO users (id, name, email, role) VALUES (?1, ?2, ?3, ?4);",
                params![
                    user.id.to_string(),
                    user.name.as_str(),
                    user.email.as_str(),
                    user.role.as_str(),
                ],
            )
            .map_err(|err| map_unique_violation(err, "users.email"))?;
        Ok(())
    }

    fn resolve_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(read_raw_user(row)))
            .optional()?;
        row.transpose()
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE email = ?1 COLLATE NOCASE;"))?;
        let row = stmt
            .query_row([email.trim()], |row| Ok(read_raw_user(row)))
            .optional()?;
        row.transpose()
    }

    fn list_users(&self, role: Option<Role>) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(role) = role {
            sql.push_str(" AND role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }
        sql.push_str(" ORDER BY name ASC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(read_raw_user(row)?);
        }
        Ok(users)
    }
}

fn read_raw_user(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = role_text.parse::<Role>().map_err(|_| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in users.role"))
    })?;

    let user = User {
        id: parse_uuid(&id_text, "users.id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role,
    };
    user.validate()
        .map_err(|err| RepoError::InvalidData(format!("users row {id_text}: {err}")))?;
    Ok(user)
}
