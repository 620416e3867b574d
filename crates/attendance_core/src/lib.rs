//! Core domain logic for role-scoped attendance tracking.
//! This crate owns the authorization table, the attendance ledger and the
//! append-only audit log.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attendance::{AttendanceRecord, AttendanceStatus, RecordId};
pub use model::audit::{AuditAction, AuditEntry, AuditId};
pub use model::time::{TimeWindow, YearMonth};
pub use model::user::{Role, User, UserId};
pub use model::ModelError;
pub use policy::{can_act, view_scope, Action, Actor, Subject, ViewScope};
pub use repo::{
    AttendanceFilter, AttendanceListQuery, AttendanceRepository, AuditListQuery, AuditRepository,
    RepoError, RepoResult, SqliteAttendanceRepository, SqliteAuditRepository,
    SqliteUserRepository, UserRepository,
};
pub use service::{
    AttendanceListRequest, AttendanceService, AttendanceSummary, ErrorKind, RegisterUserRequest,
    ServiceError, UserService,
};
