//! Command handlers. Each handler opens repositories over the shared
//! connection, calls one core service operation and prints JSON.

use crate::cli::{AuditArgs, Commands, ListArgs, RegisterArgs, SummaryCommand};
use anyhow::{bail, Context};
use attendance_core::db::Connection;
use attendance_core::{
    Actor, AttendanceListRequest, AttendanceService, AuditListQuery, CoreConfig,
    RegisterUserRequest, SqliteAttendanceRepository, SqliteAuditRepository, SqliteUserRepository,
    SystemClock, UserService,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

type SqliteAttendanceService<'conn> = AttendanceService<
    SqliteUserRepository<'conn>,
    SqliteAttendanceRepository<'conn>,
    SqliteAuditRepository<'conn>,
    SystemClock,
>;

pub fn dispatch(
    command: Commands,
    actor_id: Option<Uuid>,
    conn: &Connection,
    config: &CoreConfig,
) -> anyhow::Result<()> {
    let directory = UserService::new(SqliteUserRepository::try_new(conn)?);
    match command {
        Commands::Register(args) => register(&directory, args),
        other => {
            let actor = resolve_actor(&directory, actor_id)?;
            dispatch_as(other, &actor, &directory, conn, config)
        }
    }
}

fn dispatch_as(
    command: Commands,
    actor: &Actor,
    directory: &UserService<SqliteUserRepository<'_>>,
    conn: &Connection,
    config: &CoreConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Register(args) => register(directory, args),
        Commands::Users => print_json(&directory.list_users(actor)?),
        Commands::Profile => print_json(&directory.profile(actor)?),
        Commands::Mark => print_json(&attendance(conn, config)?.mark_attendance(actor)?),
        Commands::List(args) => list(&attendance(conn, config)?, actor, &args),
        Commands::Edit { id, status } => {
            print_json(&attendance(conn, config)?.edit_attendance(actor, id, &status)?)
        }
        Commands::Delete { id } => {
            let record = attendance(conn, config)?.delete_attendance(actor, id)?;
            print_json(&json!({ "deleted": true, "record": record }))
        }
        Commands::Audit(args) => audit(&attendance(conn, config)?, actor, &args),
        Commands::Summary(SummaryCommand::Subject { id, month }) => {
            print_json(&attendance(conn, config)?.summarize_subject(actor, id, month)?)
        }
        Commands::Summary(SummaryCommand::Team { month }) => {
            print_json(&attendance(conn, config)?.summarize_team(actor, month)?)
        }
    }
}

fn register(
    directory: &UserService<SqliteUserRepository<'_>>,
    args: RegisterArgs,
) -> anyhow::Result<()> {
    let user = directory.register_user(RegisterUserRequest {
        name: args.name,
        email: args.email,
        role: args.role,
    })?;
    print_json(&user)
}

fn list(
    service: &SqliteAttendanceService<'_>,
    actor: &Actor,
    args: &ListArgs,
) -> anyhow::Result<()> {
    let request = AttendanceListRequest {
        month: args.month,
        limit: args.limit,
        offset: args.offset,
    };
    print_json(&service.list_attendance(actor, &request)?)
}

fn audit(
    service: &SqliteAttendanceService<'_>,
    actor: &Actor,
    args: &AuditArgs,
) -> anyhow::Result<()> {
    let query = AuditListQuery {
        attendance_id: args.record,
        limit: args.limit,
        offset: args.offset,
    };
    print_json(&service.list_audit(actor, &query)?)
}

fn resolve_actor(
    directory: &UserService<SqliteUserRepository<'_>>,
    actor_id: Option<Uuid>,
) -> anyhow::Result<Actor> {
    let Some(actor_id) = actor_id else {
        bail!("this command requires --as <USER_ID>");
    };
    directory
        .resolve_actor(actor_id)
        .with_context(|| format!("cannot act as `{actor_id}`"))
}

fn attendance<'conn>(
    conn: &'conn Connection,
    config: &CoreConfig,
) -> anyhow::Result<SqliteAttendanceService<'conn>> {
    Ok(AttendanceService::new(
        SqliteUserRepository::try_new(conn)?,
        SqliteAttendanceRepository::try_new(conn)?,
        SqliteAuditRepository::try_new(conn)?,
        config.clock(),
    ))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
