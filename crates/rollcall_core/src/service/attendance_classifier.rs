//! Scan classification into present/late.
//!
//! # Responsibility
//! - Turn one student's scan into an attendance status for the local date.
//! - Apply the status transition rules with storage-level conditional writes.
//!
//! # Invariants
//! - none -> present|late and absent -> present|late are the only writes.
//! - present/late records are never modified by a later scan.
//! - A lost race never produces a second record; the stored record wins.

use super::error::{ServiceError, ServiceResult};
use super::schedule_resolver::ScheduleResolver;
use crate::clock::LocalStamp;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::student::StudentId;
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::schedule_repo::ScheduleRepository;
use log::{debug, warn};
use std::sync::Arc;

const MAX_CLASSIFY_ATTEMPTS: usize = 3;

/// Result of classifying one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: AttendanceStatus,
    /// True when an earlier scan already settled the day; nothing was written.
    pub already: bool,
    /// Record as stored after classification.
    pub record: AttendanceRecord,
}

pub struct AttendanceClassifier<S> {
    store: Arc<S>,
    resolver: Arc<ScheduleResolver<S>>,
}

impl<S> AttendanceClassifier<S>
where
    S: AttendanceRepository + ScheduleRepository,
{
    pub fn new(store: Arc<S>, resolver: Arc<ScheduleResolver<S>>) -> Self {
        Self { store, resolver }
    }

    /// Classifies a scan by `student_id` at `stamp`.
    ///
    /// Concurrent writers (the reconciliation tick) are handled by retrying
    /// against the freshly stored record; after repeated lost races the
    /// stored record is returned as `already`.
    pub fn classify(
        &self,
        student_id: StudentId,
        stamp: &LocalStamp,
    ) -> ServiceResult<Classification> {
        let schedule = self.resolver.resolve(&stamp.date)?;
        let status = AttendanceStatus::for_scan(&stamp.time, &schedule.start_time);
        let scanned = AttendanceRecord::scanned(
            student_id,
            stamp.date.clone(),
            status,
            stamp.instant,
            stamp.time.clone(),
        );

        for attempt in 1..=MAX_CLASSIFY_ATTEMPTS {
            match self.store.find_attendance(student_id, &stamp.date)? {
                None => {
                    if self.store.insert_attendance_if_absent(&scanned)? {
                        return Ok(fresh(scanned));
                    }
                }
                Some(existing) if existing.status.is_terminal() => {
                    return Ok(settled(existing));
                }
                Some(_) => {
                    if self
                        .store
                        .update_attendance_if_status(AttendanceStatus::Absent, &scanned)?
                    {
                        return Ok(fresh(scanned));
                    }
                }
            }
            debug!(
                "event=classify module=service status=retry student_id={} date={} attempt={}",
                student_id, stamp.date, attempt
            );
        }

        match self.store.find_attendance(student_id, &stamp.date)? {
            Some(existing) => {
                warn!(
                    "event=classify module=service status=race_lost student_id={} date={} stored_status={}",
                    student_id,
                    stamp.date,
                    existing.status.as_str()
                );
                Ok(settled(existing))
            }
            None => Err(ServiceError::Conflict(format!(
                "attendance for student {student_id} on {} kept changing during classification",
                stamp.date
            ))),
        }
    }
}

fn fresh(record: AttendanceRecord) -> Classification {
    Classification {
        status: record.status,
        already: false,
        record,
    }
}

fn settled(record: AttendanceRecord) -> Classification {
    Classification {
        status: record.status,
        already: true,
        record,
    }
}

#[cfg(test)]
mod tests {
    use super::AttendanceClassifier;
    use crate::clock::LocalZone;
    use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
    use crate::model::calendar::{DateKey, TimeOfDay};
    use crate::model::card::CardUid;
    use crate::model::schedule::{LessonSchedule, ScheduleOverride};
    use crate::repo::attendance_repo::AttendanceRepository;
    use crate::repo::schedule_repo::ScheduleRepository;
    use crate::repo::sqlite_store::SqliteStore;
    use crate::repo::student_repo::StudentRepository;
    use crate::service::schedule_resolver::ScheduleResolver;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Arc<SqliteStore>, AttendanceClassifier<SqliteStore>, i64) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let resolver = Arc::new(ScheduleResolver::new(
            Arc::clone(&store),
            LessonSchedule::default(),
        ));
        let classifier = AttendanceClassifier::new(Arc::clone(&store), resolver);
        let student = store
            .create_student("Aysel", &CardUid::parse("0x00 0x01").unwrap())
            .unwrap();
        (store, classifier, student.id)
    }

    fn stamp_at(hour: u32, minute: u32) -> crate::clock::LocalStamp {
        LocalZone::utc().stamp(Utc.with_ymd_and_hms(2024, 9, 16, hour, minute, 0).unwrap())
    }

    #[test]
    fn first_scan_before_start_is_present() {
        let (store, classifier, student_id) = setup();

        let result = classifier.classify(student_id, &stamp_at(8, 59)).unwrap();
        assert_eq!(result.status, AttendanceStatus::Present);
        assert!(!result.already);

        let stored = store
            .find_attendance(student_id, &DateKey::parse("2024-09-16").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stored.recorded_time.unwrap().as_str(), "08:59");
        assert!(!stored.auto_marked);
    }

    #[test]
    fn first_scan_at_start_is_late_and_second_scan_is_already() {
        let (_store, classifier, student_id) = setup();

        let first = classifier.classify(student_id, &stamp_at(9, 0)).unwrap();
        assert_eq!(first.status, AttendanceStatus::Late);
        assert!(!first.already);

        let second = classifier.classify(student_id, &stamp_at(9, 20)).unwrap();
        assert_eq!(second.status, AttendanceStatus::Late);
        assert!(second.already);
        assert_eq!(second.record.recorded_time.unwrap().as_str(), "09:00");
    }

    #[test]
    fn absent_record_is_upgraded_in_place() {
        let (store, classifier, student_id) = setup();
        let date = DateKey::parse("2024-09-16").unwrap();
        store
            .insert_attendance_if_absent(&AttendanceRecord::auto_absent(
                student_id,
                date.clone(),
                TimeOfDay::parse("09:01").unwrap(),
            ))
            .unwrap();

        let result = classifier.classify(student_id, &stamp_at(9, 15)).unwrap();
        assert_eq!(result.status, AttendanceStatus::Late);
        assert!(!result.already);

        let stored = store.find_attendance(student_id, &date).unwrap().unwrap();
        assert_eq!(stored.status, AttendanceStatus::Late);
        assert!(!stored.auto_marked);
        assert!(stored.scan_time.is_some());
        assert_eq!(store.list_attendance_for_date(&date).unwrap().len(), 1);
    }

    #[test]
    fn per_date_override_moves_the_threshold() {
        let (store, classifier, student_id) = setup();
        store
            .upsert_schedule_override(&ScheduleOverride {
                date: DateKey::parse("2024-09-16").unwrap(),
                schedule: LessonSchedule::parse("09:30", "10:30").unwrap(),
            })
            .unwrap();

        let result = classifier.classify(student_id, &stamp_at(9, 10)).unwrap();
        assert_eq!(result.status, AttendanceStatus::Present);
    }
}
