use attendance_core::db::open_db_in_memory;
use attendance_core::{
    Action, Actor, AttendanceListQuery, AttendanceListRequest, AttendanceRecord,
    AttendanceRepository, AttendanceService, AttendanceStatus, AuditAction, AuditListQuery,
    ErrorKind, FixedClock, RecordId, RepoResult, Role, ServiceError, SqliteAttendanceRepository,
    SqliteAuditRepository, SqliteUserRepository, User, UserId, UserRepository, YearMonth,
};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
use rusqlite::Connection;
use uuid::Uuid;

type Service<'c> = AttendanceService<
    SqliteUserRepository<'c>,
    SqliteAttendanceRepository<'c>,
    SqliteAuditRepository<'c>,
    &'c FixedClock,
>;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn at(offset_hours: i32, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(offset_hours * 3600)
        .unwrap()
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
}

fn service<'c>(conn: &'c Connection, clock: &'c FixedClock) -> Service<'c> {
    AttendanceService::new(
        SqliteUserRepository::try_new(conn).unwrap(),
        SqliteAttendanceRepository::try_new(conn).unwrap(),
        SqliteAuditRepository::try_new(conn).unwrap(),
        clock,
    )
}

fn add_user(conn: &Connection, name: &str, role: Role) -> Actor {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    let user = User::new(name, format!("{}@example.com", name.to_lowercase()), role).unwrap();
    repo.insert_user(&user).unwrap();
    Actor::new(user.id, user.role)
}

fn audit_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM audit_entries;", [], |row| row.get(0))
        .unwrap()
}

fn all(service: &Service<'_>, actor: &Actor) -> Vec<AttendanceRecord> {
    service
        .list_attendance(actor, &AttendanceListRequest::default())
        .unwrap()
}

#[test]
fn second_self_mark_on_same_day_returns_already_marked() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let grace = add_user(&conn, "Grace", Role::User);

    let first = svc.mark_attendance(&grace).unwrap();
    assert_eq!(first.status, AttendanceStatus::Present);
    assert_eq!(first.subject_name, "Grace");

    clock.advance(Duration::hours(8));
    let err = svc.mark_attendance(&grace).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::AlreadyMarked { record_id: Some(id) } if id == first.id
    ));
    assert_eq!(err.kind(), ErrorKind::AlreadyMarked);
    assert_eq!(all(&svc, &grace).len(), 1);
}

#[test]
fn next_local_day_allows_a_new_mark() {
    let conn = setup();
    let clock = FixedClock::at(at(5, 2026, 3, 2, 23, 30));
    let svc = service(&conn, &clock);
    let grace = add_user(&conn, "Grace", Role::User);

    let monday = svc.mark_attendance(&grace).unwrap();
    clock.advance(Duration::hours(1));
    let tuesday = svc.mark_attendance(&grace).unwrap();

    assert_ne!(monday.day, tuesday.day);
    let ids: Vec<Uuid> = all(&svc, &grace).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![tuesday.id, monday.id]);
}

#[test]
fn offset_change_between_marks_uses_stored_day() {
    let conn = setup();
    let clock = FixedClock::at(at(-5, 2026, 1, 31, 23, 30));
    let svc = service(&conn, &clock);
    let grace = add_user(&conn, "Grace", Role::User);

    let saturday = svc.mark_attendance(&grace).unwrap();
    assert_eq!(saturday.day.to_string(), "2026-01-31");

    // The Saturday record's instant (04:30Z) lies inside the UTC Sunday.
    clock.set(at(0, 2026, 2, 1, 6, 0));
    let sunday = svc.mark_attendance(&grace).unwrap();
    assert_eq!(sunday.day.to_string(), "2026-02-01");

    let err = svc.mark_attendance(&grace).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::AlreadyMarked { record_id: Some(id) } if id == sunday.id
    ));
    assert_eq!(all(&svc, &grace).len(), 2);
}

#[test]
fn unknown_actor_cannot_mark() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let ghost = Actor::new(Uuid::new_v4(), Role::User);

    let err = svc.mark_attendance(&ghost).unwrap_err();
    assert!(matches!(err, ServiceError::UserNotFound(id) if id == ghost.id));
}

#[test]
fn manager_edits_user_record_and_audit_captures_both_states() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let grace = add_user(&conn, "Grace", Role::User);
    let max = add_user(&conn, "Max", Role::Manager);

    let record = svc.mark_attendance(&grace).unwrap();
    clock.advance(Duration::minutes(5));
    let edited = svc.edit_attendance(&max, record.id, "Absent").unwrap();
    assert_eq!(edited.status, AttendanceStatus::Absent);

    let admin = add_user(&conn, "Ada", Role::Admin);
    let entries = svc.list_audit(&admin, &AuditListQuery::default()).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, AuditAction::Edit);
    assert_eq!(entry.attendance_id, record.id);
    assert_eq!(entry.changed_user_name, "Grace");
    assert_eq!(entry.changed_by_name, "Max");
    assert_eq!(entry.old_value, "Present");
    assert_eq!(entry.new_value, "Absent");
    assert_eq!(entry.timestamp, clock_now_utc(&clock));

    let stored = all(&svc, &admin);
    assert_eq!(stored[0].status, AttendanceStatus::Absent);
}

#[test]
fn user_editing_own_record_is_forbidden_and_not_audited() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let grace = add_user(&conn, "Grace", Role::User);
    let record = svc.mark_attendance(&grace).unwrap();

    let err = svc.edit_attendance(&grace, record.id, "Absent").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Forbidden {
            action: Action::Edit
        }
    ));
    let err = svc.delete_attendance(&grace, record.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    assert_eq!(audit_count(&conn), 0);
    assert_eq!(all(&svc, &grace)[0].status, AttendanceStatus::Present);
}

#[test]
fn admin_deletes_manager_record_and_audit_survives() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let max = add_user(&conn, "Max", Role::Manager);
    let record = svc.mark_attendance(&max).unwrap();

    let removed = svc.delete_attendance(&admin, record.id).unwrap();
    assert_eq!(removed.id, record.id);
    assert!(all(&svc, &admin).is_empty());

    let entries = svc.list_audit(&admin, &AuditListQuery::default()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Delete);
    assert_eq!(entries[0].attendance_id, record.id);
    assert_eq!(entries[0].changed_user_name, "Max");
    assert_eq!(entries[0].changed_by_name, "Ada");
    assert_eq!(entries[0].old_value, "Present");
    assert_eq!(entries[0].new_value, "Deleted");

    let err = svc.delete_attendance(&admin, record.id).unwrap_err();
    assert!(matches!(err, ServiceError::RecordNotFound(id) if id == record.id));
    assert_eq!(audit_count(&conn), 1);
}

/// Ledger whose row disappears just before the service deletes it.
struct RacingLedger<'c> {
    inner: SqliteAttendanceRepository<'c>,
}

impl AttendanceRepository for RacingLedger<'_> {
    fn find_for_day(
        &self,
        subject_id: UserId,
        day: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>> {
        self.inner.find_for_day(subject_id, day)
    }
    fn insert_record(&self, record: &AttendanceRecord) -> RepoResult<()> {
        self.inner.insert_record(record)
    }
    fn find_by_id(&self, id: RecordId) -> RepoResult<Option<AttendanceRecord>> {
        self.inner.find_by_id(id)
    }
    fn update_record(&self, record: &AttendanceRecord) -> RepoResult<()> {
        self.inner.update_record(record)
    }
    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool> {
        self.inner.delete_by_id(id)?;
        self.inner.delete_by_id(id)
    }
    fn list_records(&self, query: &AttendanceListQuery) -> RepoResult<Vec<AttendanceRecord>> {
        self.inner.list_records(query)
    }
}

#[test]
fn delete_racing_another_writer_reports_not_found_and_keeps_entry() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let admin = add_user(&conn, "Ada", Role::Admin);
    let grace = add_user(&conn, "Grace", Role::User);
    let record = service(&conn, &clock).mark_attendance(&grace).unwrap();

    let racing = AttendanceService::new(
        SqliteUserRepository::try_new(&conn).unwrap(),
        RacingLedger {
            inner: SqliteAttendanceRepository::try_new(&conn).unwrap(),
        },
        SqliteAuditRepository::try_new(&conn).unwrap(),
        &clock,
    );

    let err = racing.delete_attendance(&admin, record.id).unwrap_err();
    assert!(matches!(err, ServiceError::RecordNotFound(id) if id == record.id));

    let entries = racing.list_audit(&admin, &AuditListQuery::default()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Delete);
    assert_eq!(entries[0].attendance_id, record.id);
}

#[test]
fn privileged_subjects_are_mutable_by_admin_only() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let max = add_user(&conn, "Max", Role::Manager);
    let mia = add_user(&conn, "Mia", Role::Manager);

    let admin_record = svc.mark_attendance(&admin).unwrap();
    let mia_record = svc.mark_attendance(&mia).unwrap();
    let max_record = svc.mark_attendance(&max).unwrap();

    for record_id in [admin_record.id, mia_record.id, max_record.id] {
        let err = svc.edit_attendance(&max, record_id, "Absent").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = svc.delete_attendance(&max, record_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
    assert_eq!(audit_count(&conn), 0);

    for record_id in [admin_record.id, mia_record.id, max_record.id] {
        svc.edit_attendance(&admin, record_id, "Absent").unwrap();
    }
    assert_eq!(audit_count(&conn), 3);
}

#[test]
fn listings_are_scoped_by_role() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let max = add_user(&conn, "Max", Role::Manager);
    let grace = add_user(&conn, "Grace", Role::User);
    let alan = add_user(&conn, "Alan", Role::User);

    for actor in [&admin, &max, &grace, &alan] {
        svc.mark_attendance(actor).unwrap();
    }

    let subjects = |actor: &Actor| -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = all(&svc, actor).into_iter().map(|r| r.subject_id).collect();
        ids.sort();
        ids
    };
    let sorted = |mut ids: Vec<Uuid>| {
        ids.sort();
        ids
    };

    assert_eq!(subjects(&admin), sorted(vec![admin.id, max.id, grace.id, alan.id]));
    assert_eq!(subjects(&max), sorted(vec![grace.id, alan.id]));
    assert_eq!(subjects(&grace), vec![grace.id]);
    assert_eq!(subjects(&alan), vec![alan.id]);
}

#[test]
fn listing_ties_keep_insertion_order() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let grace = add_user(&conn, "Grace", Role::User);
    let alan = add_user(&conn, "Alan", Role::User);

    let first = svc.mark_attendance(&grace).unwrap();
    let second = svc.mark_attendance(&alan).unwrap();

    let ids: Vec<Uuid> = all(&svc, &admin).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[test]
fn listing_honors_month_and_pagination() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 2, 27, 9, 0));
    let svc = service(&conn, &clock);
    let grace = add_user(&conn, "Grace", Role::User);

    let mut marked = Vec::new();
    for _ in 0..4 {
        marked.push(svc.mark_attendance(&grace).unwrap());
        clock.advance(Duration::days(1));
    }

    let march = svc
        .list_attendance(
            &grace,
            &AttendanceListRequest {
                month: Some(YearMonth::new(2026, 3).unwrap()),
                ..AttendanceListRequest::default()
            },
        )
        .unwrap();
    assert_eq!(march.len(), 2);
    assert_eq!(march[0].id, marked[3].id);

    let page = svc
        .list_attendance(
            &grace,
            &AttendanceListRequest {
                month: None,
                limit: Some(2),
                offset: 1,
            },
        )
        .unwrap();
    let ids: Vec<Uuid> = page.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![marked[2].id, marked[1].id]);
}

#[test]
fn missing_record_is_not_found_before_authorization() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let grace = add_user(&conn, "Grace", Role::User);
    let missing = Uuid::new_v4();

    let err = svc.edit_attendance(&grace, missing, "Absent").unwrap_err();
    assert!(matches!(err, ServiceError::RecordNotFound(id) if id == missing));
    let err = svc.delete_attendance(&grace, missing).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn invalid_status_is_rejected_after_authorization() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let grace = add_user(&conn, "Grace", Role::User);
    let record = svc.mark_attendance(&grace).unwrap();

    let err = svc.edit_attendance(&grace, record.id, "Late").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    for status in ["Late", "absent", " Absent", "PRESENT", ""] {
        let err = svc.edit_attendance(&admin, record.id, status).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{status:?}");
    }
    assert_eq!(audit_count(&conn), 0);
    assert_eq!(all(&svc, &admin)[0].status, AttendanceStatus::Present);
}

#[test]
fn edit_to_same_status_is_still_audited() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let grace = add_user(&conn, "Grace", Role::User);
    let record = svc.mark_attendance(&grace).unwrap();

    svc.edit_attendance(&admin, record.id, "Present").unwrap();

    let entries = svc.list_audit(&admin, &AuditListQuery::default()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].old_value, "Present");
    assert_eq!(entries[0].new_value, "Present");
}

#[test]
fn unresolvable_subject_is_admin_only_and_audited_as_unknown() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let max = add_user(&conn, "Max", Role::Manager);
    let grace = add_user(&conn, "Grace", Role::User);
    let record = svc.mark_attendance(&grace).unwrap();

    conn.execute("DELETE FROM users WHERE id = ?1;", [grace.id.to_string()])
        .unwrap();

    let err = svc.edit_attendance(&max, record.id, "Absent").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert!(all(&svc, &max).is_empty());

    svc.edit_attendance(&admin, record.id, "Absent").unwrap();
    let entries = svc.list_audit(&admin, &AuditListQuery::default()).unwrap();
    assert_eq!(entries[0].changed_user_name, "Unknown");
    assert_eq!(all(&svc, &admin)[0].subject_name, "Grace");
}

#[test]
fn name_snapshot_is_kept_while_audit_uses_current_name() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let grace = add_user(&conn, "Grace", Role::User);
    let record = svc.mark_attendance(&grace).unwrap();

    conn.execute(
        "UPDATE users SET name = 'Grace Hopper' WHERE id = ?1;",
        [grace.id.to_string()],
    )
    .unwrap();
    svc.edit_attendance(&admin, record.id, "Absent").unwrap();

    assert_eq!(all(&svc, &admin)[0].subject_name, "Grace");
    let entries = svc.list_audit(&admin, &AuditListQuery::default()).unwrap();
    assert_eq!(entries[0].changed_user_name, "Grace Hopper");
}

#[test]
fn audit_log_is_admin_only_and_newest_first() {
    let conn = setup();
    let clock = FixedClock::at(at(0, 2026, 3, 2, 9, 0));
    let svc = service(&conn, &clock);
    let admin = add_user(&conn, "Ada", Role::Admin);
    let max = add_user(&conn, "Max", Role::Manager);
    let grace = add_user(&conn, "Grace", Role::User);
    let record = svc.mark_attendance(&grace).unwrap();

    svc.edit_attendance(&max, record.id, "Absent").unwrap();
    svc.edit_attendance(&max, record.id, "Present").unwrap();
    clock.advance(Duration::minutes(1));
    svc.delete_attendance(&max, record.id).unwrap();

    for actor in [&max, &grace] {
        let err = svc.list_audit(actor, &AuditListQuery::default()).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Forbidden {
                action: Action::ViewAudit
            }
        ));
    }

    let entries = svc.list_audit(&admin, &AuditListQuery::default()).unwrap();
    let values: Vec<(&str, &str)> = entries
        .iter()
        .map(|e| (e.old_value.as_str(), e.new_value.as_str()))
        .collect();
    assert_eq!(
        values,
        vec![
            ("Present", "Deleted"),
            ("Absent", "Present"),
            ("Present", "Absent"),
        ]
    );

    let scoped = svc
        .list_audit(
            &admin,
            &AuditListQuery {
                attendance_id: Some(record.id),
                limit: Some(1),
                offset: 0,
            },
        )
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].action, AuditAction::Delete);
}

fn clock_now_utc(clock: &FixedClock) -> chrono::DateTime<chrono::Utc> {
    use attendance_core::Clock;
    clock.now().with_timezone(&chrono::Utc)
}
