//! Attendance desk facade.
//!
//! # Responsibility
//! - Own one set of session, ledger and reconciliation state per reader desk.
//! - Expose scan, capture, schedule, roster and query operations to the
//!   serving layer.
//!
//! # Invariants
//! - Every clock read goes through the injected `Clock`.
//! - Capture scans never reach storage or the ledger.
//! - Unknown cards are recorded in the ledger before `UnknownCard` is returned.

use super::attendance_classifier::AttendanceClassifier;
use super::card_session::{
    AttendanceOutcome, CaptureKind, CaptureMode, CardSessionManager, ScanOutcome, ScanSink,
};
use super::error::{ServiceError, ServiceResult};
use super::reconciliation::{ReconciliationScheduler, TickOutcome};
use super::roster_service::RosterService;
use super::scan_ledger::{ScanEvent, ScanEventOutcome, ScanLedger};
use super::schedule_resolver::ScheduleResolver;
use crate::clock::{Clock, LocalZone};
use crate::config::{ConfigError, RollcallConfig, DEFAULT_LEDGER_CAPACITY};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
use crate::model::calendar::DateKey;
use crate::model::card::CardUid;
use crate::model::schedule::{EffectiveSchedule, LessonSchedule, ScheduleOverride, ScheduleScope};
use crate::model::student::{Student, StudentId};
use crate::repo::AttendanceStore;
use chrono::{DateTime, Utc};
use log::{error, info};
use std::sync::Arc;

enum ScheduleTarget {
    Global,
    Override(DateKey),
}

impl ScheduleTarget {
    fn scope(&self) -> ScheduleScope {
        match self {
            Self::Global => ScheduleScope::Global,
            Self::Override(_) => ScheduleScope::Custom,
        }
    }
}

/// Per-desk settings derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskSettings {
    pub zone: LocalZone,
    /// Lesson window used until a global schedule is stored.
    pub default_schedule: LessonSchedule,
    pub ledger_capacity: usize,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            zone: LocalZone::utc(),
            default_schedule: LessonSchedule::default(),
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
        }
    }
}

impl DeskSettings {
    pub fn from_config(config: &RollcallConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            zone: config.zone()?,
            default_schedule: config.default_schedule()?,
            ledger_capacity: config.ledger.capacity,
        })
    }
}

pub struct AttendanceDesk<S> {
    store: Arc<S>,
    zone: LocalZone,
    clock: Arc<dyn Clock>,
    resolver: Arc<ScheduleResolver<S>>,
    classifier: AttendanceClassifier<S>,
    sessions: CardSessionManager,
    reconciler: ReconciliationScheduler<S>,
    ledger: ScanLedger,
    roster: RosterService<S>,
}

impl<S: AttendanceStore> AttendanceDesk<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: DeskSettings) -> Self {
        let resolver = Arc::new(ScheduleResolver::new(
            Arc::clone(&store),
            settings.default_schedule,
        ));
        Self {
            classifier: AttendanceClassifier::new(Arc::clone(&store), Arc::clone(&resolver)),
            reconciler: ReconciliationScheduler::new(
                Arc::clone(&store),
                Arc::clone(&resolver),
                settings.zone,
            ),
            roster: RosterService::new(Arc::clone(&store)),
            sessions: CardSessionManager::new(),
            ledger: ScanLedger::new(settings.ledger_capacity),
            zone: settings.zone,
            resolver,
            clock,
            store,
        }
    }

    /// Routes one reader scan at `now`: captured while a session is active,
    /// classified as attendance otherwise.
    pub fn submit_scan(&self, raw_uid: &str, now: DateTime<Utc>) -> ServiceResult<ScanOutcome> {
        self.sessions.consume(raw_uid, now, self)
    }

    /// `submit_scan` at the desk clock's current instant.
    pub fn scan(&self, raw_uid: &str) -> ServiceResult<ScanOutcome> {
        self.submit_scan(raw_uid, self.clock.now())
    }

    pub fn start_capture_session(&self, kind: CaptureKind) {
        self.sessions.start(kind);
    }

    pub fn cancel_capture_session(&self) {
        self.sessions.cancel();
    }

    pub fn peek_captured_uid(&self) -> Option<CardUid> {
        self.sessions.peek_captured_uid()
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.sessions.mode()
    }

    /// Records on `date` ordered by student id.
    pub fn get_daily_attendance(&self, date: &str) -> ServiceResult<Vec<AttendanceRecord>> {
        let date = DateKey::parse(date)?;
        Ok(self.store.list_attendance_for_date(&date)?)
    }

    /// Stores a lesson window for `date`, or the global window when `date`
    /// is `None`, then reconciles the affected date immediately.
    ///
    /// # Errors
    /// - `Validation` for malformed input or `start >= end`; nothing is written.
    /// - `Storage` when the write or the reconciliation fails; the previously
    ///   stored window is put back before the error is returned.
    pub fn set_schedule(
        &self,
        date: Option<&str>,
        start_time: &str,
        end_time: &str,
    ) -> ServiceResult<ScheduleScope> {
        let schedule = LessonSchedule::parse(start_time, end_time)?;
        let target = match date {
            Some(raw) => ScheduleTarget::Override(DateKey::parse(raw)?),
            None => ScheduleTarget::Global,
        };
        let now = self.clock.now();

        let previous = self.stored_schedule(&target)?;
        self.store_schedule(&target, Some(&schedule))?;

        match self.reconcile_schedule_change(&target, now) {
            Ok(affected) => {
                info!(
                    "event=schedule_set module=desk status=ok scope={:?} date={}",
                    target.scope(),
                    affected.as_ref().map_or("-", DateKey::as_str)
                );
                Ok(target.scope())
            }
            Err(err) => {
                let restored = self.store_schedule(&target, previous.as_ref());
                error!(
                    "event=schedule_set module=desk status=error scope={:?} restored={} error={}",
                    target.scope(),
                    restored.is_ok(),
                    err
                );
                if let Err(restore_err) = restored {
                    error!(
                        "event=schedule_restore module=desk status=error error={}",
                        restore_err
                    );
                }
                Err(err)
            }
        }
    }

    fn stored_schedule(&self, target: &ScheduleTarget) -> ServiceResult<Option<LessonSchedule>> {
        Ok(match target {
            ScheduleTarget::Global => self.store.get_global_schedule()?,
            ScheduleTarget::Override(date) => self
                .store
                .find_schedule_override(date)?
                .map(|custom| custom.schedule),
        })
    }

    /// Writes `schedule` for `target`; `None` removes the stored window.
    fn store_schedule(
        &self,
        target: &ScheduleTarget,
        schedule: Option<&LessonSchedule>,
    ) -> ServiceResult<()> {
        match (target, schedule) {
            (ScheduleTarget::Global, Some(schedule)) => {
                self.store.upsert_global_schedule(schedule)?
            }
            (ScheduleTarget::Global, None) => self.store.clear_global_schedule()?,
            (ScheduleTarget::Override(date), Some(schedule)) => {
                self.store.upsert_schedule_override(&ScheduleOverride {
                    date: date.clone(),
                    schedule: schedule.clone(),
                })?
            }
            (ScheduleTarget::Override(date), None) => self.store.delete_schedule_override(date)?,
        }
        Ok(())
    }

    fn reconcile_schedule_change(
        &self,
        target: &ScheduleTarget,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<DateKey>> {
        let affected = match target {
            ScheduleTarget::Override(date) => Some(date.clone()),
            ScheduleTarget::Global => {
                let today = self.zone.stamp(now).date;
                // An override for today shields it from global edits.
                (!self.resolver.resolve(&today)?.is_custom).then_some(today)
            }
        };
        if let Some(date) = &affected {
            self.reconciler.reconcile_date(date, now)?;
        }
        Ok(affected)
    }

    /// One reconciliation pass at `now`; skipped when a pass is in flight.
    pub fn tick(&self, now: DateTime<Utc>) -> ServiceResult<TickOutcome> {
        self.reconciler.tick(now)
    }

    pub fn enroll_student(&self, name: &str, raw_uid: &str) -> ServiceResult<Student> {
        self.roster.enroll(name, raw_uid)
    }

    pub fn remove_student(&self, id: StudentId) -> ServiceResult<()> {
        self.roster.remove(id)
    }

    pub fn remove_student_by_card(&self, raw_uid: &str) -> ServiceResult<Student> {
        self.roster.remove_by_card(raw_uid)
    }

    pub fn list_students(&self) -> ServiceResult<Vec<Student>> {
        self.roster.list()
    }

    pub fn student_history(&self, id: StudentId) -> ServiceResult<Vec<AttendanceRecord>> {
        self.roster.history(id)
    }

    /// Raw status counts for `date`.
    pub fn daily_summary(&self, date: &str) -> ServiceResult<AttendanceSummary> {
        let date = DateKey::parse(date)?;
        let records = self.store.list_attendance_for_date(&date)?;
        let enrolled = self.store.list_students()?.len();

        let mut summary = AttendanceSummary {
            enrolled,
            ..AttendanceSummary::default()
        };
        for record in &records {
            match record.status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Late => summary.late += 1,
                AttendanceStatus::Absent => summary.absent += 1,
            }
        }
        summary.unrecorded = enrolled.saturating_sub(records.len());
        Ok(summary)
    }

    pub fn effective_schedule(&self, date: &str) -> ServiceResult<EffectiveSchedule> {
        let date = DateKey::parse(date)?;
        self.resolver.resolve(&date)
    }

    /// Recent scan outcomes, newest first.
    pub fn recent_scans(&self) -> Vec<ScanEvent> {
        self.ledger.list()
    }

    pub fn last_reconciliation(&self) -> Option<DateTime<Utc>> {
        self.reconciler.last_run()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Local calendar date of the desk clock.
    pub fn today(&self) -> DateKey {
        self.zone.stamp(self.clock.now()).date
    }
}

impl<S: AttendanceStore> ScanSink for AttendanceDesk<S> {
    fn record_scan(&self, uid: &CardUid, now: DateTime<Utc>) -> ServiceResult<AttendanceOutcome> {
        let Some(student) = self.roster.find_by_card(uid)? else {
            self.ledger.push(ScanEvent {
                uid: uid.clone(),
                timestamp: now,
                outcome: ScanEventOutcome::UnknownCard,
            });
            info!(
                "event=scan module=desk status=skip reason=unknown_card uid={}",
                uid.masked()
            );
            return Err(ServiceError::UnknownCard(uid.clone()));
        };

        let stamp = self.zone.stamp(now);
        let classification = self.classifier.classify(student.id, &stamp)?;
        self.ledger.push(ScanEvent {
            uid: uid.clone(),
            timestamp: now,
            outcome: ScanEventOutcome::Recorded {
                student_id: student.id,
                student_name: student.name.clone(),
                status: classification.status,
                already: classification.already,
            },
        });
        info!(
            "event=scan module=desk status=ok student_id={} date={} attendance={} already={}",
            student.id,
            stamp.date,
            classification.status.as_str(),
            classification.already
        );

        Ok(AttendanceOutcome {
            student,
            date: stamp.date,
            status: classification.status,
            already: classification.already,
            recorded_time: classification.record.recorded_time,
        })
    }
}
