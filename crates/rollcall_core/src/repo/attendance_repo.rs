//! Attendance record repository contract.

use super::RepoResult;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::calendar::{DateKey, TimeOfDay};
use crate::model::student::StudentId;

pub trait AttendanceRepository {
    fn find_attendance(
        &self,
        student_id: StudentId,
        date: &DateKey,
    ) -> RepoResult<Option<AttendanceRecord>>;

    /// Inserts `record` unless one exists for its `(student_id, date)`.
    ///
    /// Returns `false` when an existing record won; never overwrites.
    fn insert_attendance_if_absent(&self, record: &AttendanceRecord) -> RepoResult<bool>;

    /// Replaces status, scan time, recorded time and auto flag of the record
    /// for `(record.student_id, record.date)` only while its stored status is
    /// still `expected`.
    ///
    /// Returns `false` when no row matched (missing or changed concurrently).
    fn update_attendance_if_status(
        &self,
        expected: AttendanceStatus,
        record: &AttendanceRecord,
    ) -> RepoResult<bool>;

    /// Deletes every record on `date`, returning how many were removed.
    fn delete_attendance_for_date(&self, date: &DateKey) -> RepoResult<usize>;

    /// Deletes records on `date` that assume the lesson began at `start`:
    /// any non-present status, and present records without a recorded time
    /// or recorded at/after `start`.
    fn delete_attendance_since(&self, date: &DateKey, start: &TimeOfDay) -> RepoResult<usize>;

    /// Records on `date` ordered by student id.
    fn list_attendance_for_date(&self, date: &DateKey) -> RepoResult<Vec<AttendanceRecord>>;

    /// One student's records, newest date first.
    fn list_attendance_for_student(
        &self,
        student_id: StudentId,
    ) -> RepoResult<Vec<AttendanceRecord>>;
}
