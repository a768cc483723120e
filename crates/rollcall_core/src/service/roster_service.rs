//! Student roster use-cases.
//!
//! # Responsibility
//! - Enroll and remove students bound to cards.
//! - Serve per-student attendance history.
//!
//! # Invariants
//! - A card UID belongs to at most one student.
//! - Removing a student removes their attendance.

use super::error::{ServiceError, ServiceResult};
use crate::model::attendance::AttendanceRecord;
use crate::model::card::CardUid;
use crate::model::student::{normalize_student_name, Student, StudentId};
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::student_repo::StudentRepository;
use crate::repo::RepoError;
use log::info;
use std::sync::Arc;

pub struct RosterService<S> {
    store: Arc<S>,
}

impl<S> RosterService<S>
where
    S: StudentRepository + AttendanceRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Enrolls `name` with the card read as `raw_uid`.
    ///
    /// # Errors
    /// - `Validation` for a blank name or malformed UID.
    /// - `Conflict` when the card is already enrolled.
    pub fn enroll(&self, name: &str, raw_uid: &str) -> ServiceResult<Student> {
        let name = normalize_student_name(name)?;
        let uid = CardUid::parse(raw_uid)?;
        let student = self.store.create_student(&name, &uid)?;
        info!(
            "event=student_enroll module=roster status=ok student_id={} uid={}",
            student.id,
            uid.masked()
        );
        Ok(student)
    }

    pub fn remove(&self, id: StudentId) -> ServiceResult<()> {
        match self.store.delete_student(id) {
            Ok(()) => {
                info!("event=student_remove module=roster status=ok student_id={id}");
                Ok(())
            }
            Err(RepoError::NotFound(_)) => Err(ServiceError::StudentNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the student holding the card read as `raw_uid`.
    pub fn remove_by_card(&self, raw_uid: &str) -> ServiceResult<Student> {
        let uid = CardUid::parse(raw_uid)?;
        let student = self
            .store
            .find_student_by_uid(&uid)?
            .ok_or(ServiceError::UnknownCard(uid))?;
        self.remove(student.id)?;
        Ok(student)
    }

    pub fn list(&self) -> ServiceResult<Vec<Student>> {
        Ok(self.store.list_students()?)
    }

    pub fn find_by_card(&self, uid: &CardUid) -> ServiceResult<Option<Student>> {
        Ok(self.store.find_student_by_uid(uid)?)
    }

    /// Attendance of one student, newest date first.
    pub fn history(&self, id: StudentId) -> ServiceResult<Vec<AttendanceRecord>> {
        if self.store.find_student_by_id(id)?.is_none() {
            return Err(ServiceError::StudentNotFound(id));
        }
        Ok(self.store.list_attendance_for_student(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::RosterService;
    use crate::repo::sqlite_store::SqliteStore;
    use crate::service::error::{ErrorKind, ServiceError};
    use std::sync::Arc;

    fn roster() -> RosterService<SqliteStore> {
        RosterService::new(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    #[test]
    fn enroll_trims_name_and_rejects_duplicate_cards() {
        let roster = roster();
        let student = roster.enroll("  Nigar  ", " 04:A2:19 ").unwrap();
        assert_eq!(student.name, "Nigar");
        assert_eq!(student.card_uid.as_str(), "04:A2:19");

        let err = roster.enroll("Other", "04:A2:19").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(roster.list().unwrap().len(), 1);
    }

    #[test]
    fn enroll_rejects_blank_name() {
        let err = roster().enroll("   ", "card-1").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn removal_reports_unknown_targets() {
        let roster = roster();
        let student = roster.enroll("Murad", "card-1").unwrap();

        assert!(matches!(
            roster.remove_by_card("card-2"),
            Err(ServiceError::UnknownCard(_))
        ));
        assert_eq!(roster.remove_by_card("card-1").unwrap().id, student.id);
        assert!(matches!(
            roster.remove(student.id),
            Err(ServiceError::StudentNotFound(id)) if id == student.id
        ));
        assert!(matches!(
            roster.history(student.id),
            Err(ServiceError::StudentNotFound(_))
        ));
    }
}
