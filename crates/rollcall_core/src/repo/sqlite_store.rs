//! SQLite implementation of the attendance repositories.
//!
//! # Responsibility
//! - Serve student, attendance and schedule persistence from one connection.
//! - Translate constraint failures into semantic `RepoError` variants.
//!
//! # Invariants
//! - Every statement runs under the connection mutex; one statement is the
//!   unit of atomicity, which is all the conditional writes need.
//! - Read paths reject invalid persisted rows instead of masking them.

use super::attendance_repo::AttendanceRepository;
use super::schedule_repo::ScheduleRepository;
use super::student_repo::StudentRepository;
use super::{RepoError, RepoResult};
use crate::db::{open_db, open_db_in_memory};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::calendar::{DateKey, TimeOfDay};
use crate::model::card::CardUid;
use crate::model::schedule::{LessonSchedule, ScheduleOverride};
use crate::model::student::{Student, StudentId};
use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, Row, Rows};
use std::path::Path;
use std::sync::Mutex;

const STUDENT_SELECT_SQL: &str = "SELECT id, name, card_uid FROM students";

const ATTENDANCE_SELECT_SQL: &str = "SELECT
    student_id,
    date,
    status,
    scan_time,
    recorded_time,
    auto_marked
FROM attendance";

/// Connection-owning store shared by the desk and the reconciliation thread.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wraps a connection that already went through `open_db*`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn with_conn<T>(&self, op: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        let guard = self.conn.lock().map_err(|_| RepoError::LockPoisoned)?;
        op(&guard)
    }
}

impl StudentRepository for SqliteStore {
    fn create_student(&self, name: &str, card_uid: &CardUid) -> RepoResult<Student> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO students (name, card_uid) VALUES (?1, ?2);",
                params![name, card_uid.as_str()],
            );
            match inserted {
                Ok(_) => Ok(Student {
                    id: conn.last_insert_rowid(),
                    name: name.to_string(),
                    card_uid: card_uid.clone(),
                }),
                Err(err) if is_constraint(&err, ffi::SQLITE_CONSTRAINT_UNIQUE) => Err(
                    RepoError::Conflict(format!("card {} already enrolled", card_uid.masked())),
                ),
                Err(err) => Err(err.into()),
            }
        })
    }

    fn find_student_by_uid(&self, card_uid: &CardUid) -> RepoResult<Option<Student>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{STUDENT_SELECT_SQL} WHERE card_uid = ?1;"))?;
            let mut rows = stmt.query([card_uid.as_str()])?;
            let student = first_row(&mut rows, parse_student_row)?;
            Ok(student)
        })
    }

    fn find_student_by_id(&self, id: StudentId) -> RepoResult<Option<Student>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{STUDENT_SELECT_SQL} WHERE id = ?1;"))?;
            let mut rows = stmt.query([id])?;
            let student = first_row(&mut rows, parse_student_row)?;
            Ok(student)
        })
    }

    fn delete_student(&self, id: StudentId) -> RepoResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM students WHERE id = ?1;", [id])?;
            if changed == 0 {
                return Err(RepoError::NotFound(format!("student {id}")));
            }
            Ok(())
        })
    }

    fn list_students(&self) -> RepoResult<Vec<Student>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{STUDENT_SELECT_SQL} ORDER BY id ASC;"))?;
            let mut rows = stmt.query([])?;
            let mut students = Vec::new();
            while let Some(row) = rows.next()? {
                students.push(parse_student_row(row)?);
            }
            Ok(students)
        })
    }
}

impl AttendanceRepository for SqliteStore {
    fn find_attendance(
        &self,
        student_id: StudentId,
        date: &DateKey,
    ) -> RepoResult<Option<AttendanceRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ATTENDANCE_SELECT_SQL} WHERE student_id = ?1 AND date = ?2;"
            ))?;
            let mut rows = stmt.query(params![student_id, date.as_str()])?;
            let record = first_row(&mut rows, parse_attendance_row)?;
            Ok(record)
        })
    }

    fn insert_attendance_if_absent(&self, record: &AttendanceRecord) -> RepoResult<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO attendance (
                    student_id,
                    date,
                    status,
                    scan_time,
                    recorded_time,
                    auto_marked
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (student_id, date) DO NOTHING;",
                params![
                    record.student_id,
                    record.date.as_str(),
                    record.status.as_str(),
                    record.scan_time.map(|instant| instant.timestamp_millis()),
                    record.recorded_time.as_ref().map(TimeOfDay::as_str),
                    bool_to_int(record.auto_marked),
                ],
            );
            match inserted {
                Ok(changed) => Ok(changed == 1),
                Err(err) if is_constraint(&err, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => Err(
                    RepoError::NotFound(format!("student {}", record.student_id)),
                ),
                Err(err) => Err(err.into()),
            }
        })
    }

    fn update_attendance_if_status(
        &self,
        expected: AttendanceStatus,
        record: &AttendanceRecord,
    ) -> RepoResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE attendance
                 SET
                    status = ?1,
                    scan_time = ?2,
                    recorded_time = ?3,
                    auto_marked = ?4
                 WHERE student_id = ?5
                   AND date = ?6
                   AND status = ?7;",
                params![
                    record.status.as_str(),
                    record.scan_time.map(|instant| instant.timestamp_millis()),
                    record.recorded_time.as_ref().map(TimeOfDay::as_str),
                    bool_to_int(record.auto_marked),
                    record.student_id,
                    record.date.as_str(),
                    expected.as_str(),
                ],
            )?;
            Ok(changed == 1)
        })
    }

    fn delete_attendance_for_date(&self, date: &DateKey) -> RepoResult<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM attendance WHERE date = ?1;", [date.as_str()])?;
            Ok(removed)
        })
    }

    fn delete_attendance_since(&self, date: &DateKey, start: &TimeOfDay) -> RepoResult<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM attendance
                 WHERE date = ?1
                   AND (
                        status <> ?2
                        OR recorded_time IS NULL
                        OR recorded_time >= ?3
                   );",
                params![
                    date.as_str(),
                    AttendanceStatus::Present.as_str(),
                    start.as_str()
                ],
            )?;
            Ok(removed)
        })
    }

    fn list_attendance_for_date(&self, date: &DateKey) -> RepoResult<Vec<AttendanceRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ATTENDANCE_SELECT_SQL} WHERE date = ?1 ORDER BY student_id ASC;"
            ))?;
            let mut rows = stmt.query([date.as_str()])?;
            let records = collect_attendance_rows(&mut rows)?;
            Ok(records)
        })
    }

    fn list_attendance_for_student(
        &self,
        student_id: StudentId,
    ) -> RepoResult<Vec<AttendanceRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ATTENDANCE_SELECT_SQL} WHERE student_id = ?1 ORDER BY date DESC;"
            ))?;
            let mut rows = stmt.query([student_id])?;
            let records = collect_attendance_rows(&mut rows)?;
            Ok(records)
        })
    }
}

impl ScheduleRepository for SqliteStore {
    fn find_schedule_override(&self, date: &DateKey) -> RepoResult<Option<ScheduleOverride>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT start_time, end_time FROM schedule_overrides WHERE date = ?1;",
            )?;
            let mut rows = stmt.query([date.as_str()])?;
            let schedule =
                first_row(&mut rows, |row| parse_schedule_row(row, "schedule_overrides"))?;
            Ok(schedule.map(|schedule| ScheduleOverride {
                date: date.clone(),
                schedule,
            }))
        })
    }

    fn upsert_schedule_override(&self, schedule: &ScheduleOverride) -> RepoResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO schedule_overrides (date, start_time, end_time)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (date) DO UPDATE SET
                    start_time = excluded.start_time,
                    end_time = excluded.end_time;",
                params![
                    schedule.date.as_str(),
                    schedule.schedule.start_time.as_str(),
                    schedule.schedule.end_time.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    fn delete_schedule_override(&self, date: &DateKey) -> RepoResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM schedule_overrides WHERE date = ?1;",
                [date.as_str()],
            )?;
            Ok(())
        })
    }

    fn get_global_schedule(&self) -> RepoResult<Option<LessonSchedule>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT start_time, end_time FROM global_schedule WHERE id = 1;")?;
            let mut rows = stmt.query([])?;
            let schedule =
                first_row(&mut rows, |row| parse_schedule_row(row, "global_schedule"))?;
            Ok(schedule)
        })
    }

    fn upsert_global_schedule(&self, schedule: &LessonSchedule) -> RepoResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO global_schedule (id, start_time, end_time)
                 VALUES (1, ?1, ?2)
                 ON CONFLICT (id) DO UPDATE SET
                    start_time = excluded.start_time,
                    end_time = excluded.end_time;",
                params![schedule.start_time.as_str(), schedule.end_time.as_str()],
            )?;
            Ok(())
        })
    }

    fn clear_global_schedule(&self) -> RepoResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM global_schedule WHERE id = 1;", [])?;
            Ok(())
        })
    }
}

fn is_constraint(err: &rusqlite::Error, extended_code: i32) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.extended_code == extended_code
    )
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    let card_text: String = row.get("card_uid")?;
    let card_uid = CardUid::parse(&card_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid students.card_uid: {err}"))
    })?;
    Ok(Student {
        id: row.get("id")?,
        name: row.get("name")?,
        card_uid,
    })
}

fn first_row<T>(
    rows: &mut Rows<'_>,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    if let Some(row) = rows.next()? {
        return Ok(Some(parse(row)?));
    }
    Ok(None)
}

fn collect_attendance_rows(rows: &mut Rows<'_>) -> RepoResult<Vec<AttendanceRecord>> {
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_attendance_row(row)?);
    }
    Ok(records)
}

fn parse_attendance_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    let date_text: String = row.get("date")?;
    let date = DateKey::parse(&date_text)
        .map_err(|err| RepoError::InvalidData(format!("invalid attendance.date: {err}")))?;

    let status_text: String = row.get("status")?;
    let status = AttendanceStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid attendance.status `{status_text}`"))
    })?;

    let scan_time = match row.get::<_, Option<i64>>("scan_time")? {
        Some(millis) => Some(DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid attendance.scan_time `{millis}`"))
        })?),
        None => None,
    };

    let recorded_time = match row.get::<_, Option<String>>("recorded_time")? {
        Some(text) => Some(TimeOfDay::parse(&text).map_err(|err| {
            RepoError::InvalidData(format!("invalid attendance.recorded_time: {err}"))
        })?),
        None => None,
    };

    let auto_marked = match row.get::<_, i64>("auto_marked")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid attendance.auto_marked `{other}`"
            )));
        }
    };

    Ok(AttendanceRecord {
        student_id: row.get("student_id")?,
        date,
        status,
        scan_time,
        recorded_time,
        auto_marked,
    })
}

fn parse_schedule_row(row: &Row<'_>, table: &'static str) -> RepoResult<LessonSchedule> {
    let start: String = row.get("start_time")?;
    let end: String = row.get("end_time")?;
    LessonSchedule::parse(&start, &end)
        .map_err(|err| RepoError::InvalidData(format!("invalid {table} window: {err}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
