//! Absence marking and schedule-change resets.
//!
//! # Responsibility
//! - Mark enrolled students without a record absent once the lesson began.
//! - Undo records that assumed a lesson start which has not happened yet.
//!
//! # Invariants
//! - Runs never overlap: a periodic tick that finds a run in flight is
//!   skipped, an out-of-band run waits for it.
//! - Absences are only created through insert-if-absent, so a concurrent
//!   scan always wins over reconciliation.
//! - Past dates are never rewritten.

use super::error::ServiceResult;
use super::schedule_resolver::ScheduleResolver;
use crate::clock::{LocalStamp, LocalZone};
use crate::model::attendance::AttendanceRecord;
use crate::model::calendar::{DateKey, TimeOfDay};
use crate::model::student::StudentId;
use crate::repo::{AttendanceStore, RepoError};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// Where `now` sits relative to the reconciled date's lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonPhase {
    BeforeStart,
    Started,
    /// Reconciled date lies after the local today.
    Upcoming,
    /// Reconciled date lies before the local today; nothing was touched.
    Past,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub date: DateKey,
    pub phase: LessonPhase,
    pub removed: usize,
    pub marked_absent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another run held the single-flight guard.
    SkippedBusy,
    Ran(ReconciliationReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetScope {
    /// Keep early present scans; drop only what implies the lesson began.
    SinceStart,
    WholeDate,
}

pub struct ReconciliationScheduler<S> {
    store: Arc<S>,
    resolver: Arc<ScheduleResolver<S>>,
    zone: LocalZone,
    flight: Mutex<()>,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl<S: AttendanceStore> ReconciliationScheduler<S> {
    pub fn new(store: Arc<S>, resolver: Arc<ScheduleResolver<S>>, zone: LocalZone) -> Self {
        Self {
            store,
            resolver,
            zone,
            flight: Mutex::new(()),
            last_run: Mutex::new(None),
        }
    }

    /// Periodic run for the local date of `now`.
    ///
    /// # Errors
    /// Storage failures abort the run; the guard is released and the next
    /// tick starts over.
    pub fn tick(&self, now: DateTime<Utc>) -> ServiceResult<TickOutcome> {
        let _flight = match self.flight.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("event=reconcile_tick module=reconcile status=skip reason=busy");
                return Ok(TickOutcome::SkippedBusy);
            }
        };

        let stamp = self.zone.stamp(now);
        let report = self.run_today(&stamp, ResetScope::SinceStart)?;
        *self.last_run_slot() = Some(now);
        info!(
            "event=reconcile_tick module=reconcile status=ok date={} phase={:?} removed={} marked_absent={}",
            report.date, report.phase, report.removed, report.marked_absent
        );
        Ok(TickOutcome::Ran(report))
    }

    /// Out-of-band run for `date` after its schedule changed.
    ///
    /// Waits for an in-flight tick instead of skipping.
    pub fn reconcile_date(
        &self,
        date: &DateKey,
        now: DateTime<Utc>,
    ) -> ServiceResult<ReconciliationReport> {
        let _flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
        let stamp = self.zone.stamp(now);

        let report = match date.cmp(&stamp.date) {
            Ordering::Equal => self.run_today(&stamp, ResetScope::WholeDate)?,
            Ordering::Greater => ReconciliationReport {
                date: date.clone(),
                phase: LessonPhase::Upcoming,
                removed: self.store.delete_attendance_for_date(date)?,
                marked_absent: 0,
            },
            Ordering::Less => {
                warn!(
                    "event=reconcile_date module=reconcile status=skip reason=past_date date={} today={}",
                    date, stamp.date
                );
                ReconciliationReport {
                    date: date.clone(),
                    phase: LessonPhase::Past,
                    removed: 0,
                    marked_absent: 0,
                }
            }
        };
        info!(
            "event=reconcile_date module=reconcile status=ok date={} phase={:?} removed={} marked_absent={}",
            report.date, report.phase, report.removed, report.marked_absent
        );
        Ok(report)
    }

    /// Instant of the last completed periodic tick.
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run_slot()
    }

    fn run_today(
        &self,
        stamp: &LocalStamp,
        scope: ResetScope,
    ) -> ServiceResult<ReconciliationReport> {
        let date = &stamp.date;
        let schedule = self.resolver.resolve(date)?;

        if stamp.time < schedule.start_time {
            let removed = match scope {
                ResetScope::SinceStart => self
                    .store
                    .delete_attendance_since(date, &schedule.start_time)?,
                ResetScope::WholeDate => self.store.delete_attendance_for_date(date)?,
            };
            return Ok(ReconciliationReport {
                date: date.clone(),
                phase: LessonPhase::BeforeStart,
                removed,
                marked_absent: 0,
            });
        }

        let marked_absent = self.mark_absent(date, &stamp.time)?;
        Ok(ReconciliationReport {
            date: date.clone(),
            phase: LessonPhase::Started,
            removed: 0,
            marked_absent,
        })
    }

    fn mark_absent(&self, date: &DateKey, recorded_time: &TimeOfDay) -> ServiceResult<usize> {
        let recorded: HashSet<StudentId> = self
            .store
            .list_attendance_for_date(date)?
            .into_iter()
            .map(|record| record.student_id)
            .collect();

        let mut created = 0;
        for student in self.store.list_students()? {
            if recorded.contains(&student.id) {
                continue;
            }
            let record =
                AttendanceRecord::auto_absent(student.id, date.clone(), recorded_time.clone());
            match self.store.insert_attendance_if_absent(&record) {
                Ok(true) => created += 1,
                Ok(false) => debug!(
                    "event=mark_absent module=reconcile status=skip reason=record_exists student_id={} date={}",
                    student.id, date
                ),
                Err(RepoError::NotFound(_)) => debug!(
                    "event=mark_absent module=reconcile status=skip reason=student_removed student_id={} date={}",
                    student.id, date
                ),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(created)
    }

    fn last_run_slot(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{LessonPhase, ReconciliationScheduler, TickOutcome};
    use crate::clock::LocalZone;
    use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
    use crate::model::calendar::{DateKey, TimeOfDay};
    use crate::model::card::CardUid;
    use crate::model::schedule::LessonSchedule;
    use crate::repo::attendance_repo::AttendanceRepository;
    use crate::repo::sqlite_store::SqliteStore;
    use crate::repo::student_repo::StudentRepository;
    use crate::service::schedule_resolver::ScheduleResolver;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Arc<SqliteStore>, ReconciliationScheduler<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let resolver = Arc::new(ScheduleResolver::new(
            Arc::clone(&store),
            LessonSchedule::default(),
        ));
        let scheduler =
            ReconciliationScheduler::new(Arc::clone(&store), resolver, LocalZone::utc());
        (store, scheduler)
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 16, hour, minute, 0).unwrap()
    }

    fn today() -> DateKey {
        DateKey::parse("2024-09-16").unwrap()
    }

    fn enroll(store: &SqliteStore, name: &str, uid: &str) -> i64 {
        store.create_student(name, &CardUid::parse(uid).unwrap()).unwrap().id
    }

    fn scanned(student_id: i64, status: AttendanceStatus, time: &str) -> AttendanceRecord {
        AttendanceRecord::scanned(
            student_id,
            today(),
            status,
            at(8, 0),
            TimeOfDay::parse(time).unwrap(),
        )
    }

    fn ran(outcome: TickOutcome) -> super::ReconciliationReport {
        match outcome {
            TickOutcome::Ran(report) => report,
            TickOutcome::SkippedBusy => panic!("tick unexpectedly skipped"),
        }
    }

    #[test]
    fn tick_after_start_marks_only_unrecorded_students_absent() {
        let (store, scheduler) = setup();
        let early = enroll(&store, "Early", "uid-1");
        let missing = enroll(&store, "Missing", "uid-2");
        store
            .insert_attendance_if_absent(&scanned(early, AttendanceStatus::Present, "08:40"))
            .unwrap();

        let first = ran(scheduler.tick(at(9, 1)).unwrap());
        assert_eq!(first.phase, LessonPhase::Started);
        assert_eq!(first.marked_absent, 1);

        let absent = store.find_attendance(missing, &today()).unwrap().unwrap();
        assert_eq!(absent.status, AttendanceStatus::Absent);
        assert!(absent.auto_marked);
        assert_eq!(absent.recorded_time.unwrap().as_str(), "09:01");

        let second = ran(scheduler.tick(at(9, 2)).unwrap());
        assert_eq!((second.removed, second.marked_absent), (0, 0));
        assert_eq!(scheduler.last_run(), Some(at(9, 2)));
    }

    #[test]
    fn tick_before_start_keeps_early_scans_and_drops_started_state() {
        let (store, scheduler) = setup();
        let early = enroll(&store, "Early", "uid-1");
        let late = enroll(&store, "Late", "uid-2");
        let absent = enroll(&store, "Absent", "uid-3");
        store
            .insert_attendance_if_absent(&scanned(early, AttendanceStatus::Present, "08:10"))
            .unwrap();
        store
            .insert_attendance_if_absent(&scanned(late, AttendanceStatus::Late, "08:20"))
            .unwrap();
        store
            .insert_attendance_if_absent(&AttendanceRecord::auto_absent(
                absent,
                today(),
                TimeOfDay::parse("08:25").unwrap(),
            ))
            .unwrap();

        let first = ran(scheduler.tick(at(8, 30)).unwrap());
        assert_eq!(first.phase, LessonPhase::BeforeStart);
        assert_eq!(first.removed, 2);
        let remaining = store.list_attendance_for_date(&today()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].student_id, early);

        let second = ran(scheduler.tick(at(8, 31)).unwrap());
        assert_eq!((second.removed, second.marked_absent), (0, 0));
    }

    #[test]
    fn reconcile_today_before_new_start_clears_the_whole_date() {
        let (store, scheduler) = setup();
        let early = enroll(&store, "Early", "uid-1");
        store
            .insert_attendance_if_absent(&scanned(early, AttendanceStatus::Present, "08:10"))
            .unwrap();

        let report = scheduler.reconcile_date(&today(), at(8, 30)).unwrap();
        assert_eq!(report.phase, LessonPhase::BeforeStart);
        assert_eq!(report.removed, 1);
        assert!(store.list_attendance_for_date(&today()).unwrap().is_empty());
        assert_eq!(scheduler.last_run(), None);
    }

    #[test]
    fn reconcile_past_date_leaves_history_untouched() {
        let (store, scheduler) = setup();
        let student = enroll(&store, "Past", "uid-1");
        let yesterday = DateKey::parse("2024-09-15").unwrap();
        store
            .insert_attendance_if_absent(&AttendanceRecord::auto_absent(
                student,
                yesterday.clone(),
                TimeOfDay::parse("09:05").unwrap(),
            ))
            .unwrap();

        let report = scheduler.reconcile_date(&yesterday, at(8, 30)).unwrap();
        assert_eq!(report.phase, LessonPhase::Past);
        assert_eq!(store.list_attendance_for_date(&yesterday).unwrap().len(), 1);
    }

    #[test]
    fn tick_is_skipped_while_another_run_is_in_flight() {
        let (_store, scheduler) = setup();
        let held = scheduler.flight.lock().unwrap();

        assert_eq!(scheduler.tick(at(9, 5)).unwrap(), TickOutcome::SkippedBusy);
        drop(held);
        assert!(matches!(scheduler.tick(at(9, 5)).unwrap(), TickOutcome::Ran(_)));
    }
}
