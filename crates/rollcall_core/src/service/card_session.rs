//! Capture-session state machine for card enrollment and deletion.
//!
//! # Responsibility
//! - Decide whether an incoming scan is captured for enrollment/deletion or
//!   routed to attendance.
//! - Hold the captured UID until the caller picks it up.
//!
//! # Invariants
//! - One session exists per instance; starting a session silently replaces
//!   the previous one (last writer wins).
//! - `captured_uid` is cleared on every `start_*` and on `cancel`; it is
//!   set only by a capturing `consume`.
//! - The session lock is never held while the attendance path runs.

use super::error::ServiceResult;
use crate::model::attendance::AttendanceStatus;
use crate::model::calendar::{DateKey, TimeOfDay};
use crate::model::card::CardUid;
use crate::model::student::Student;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Idle,
    AwaitingEnroll,
    AwaitingDelete,
}

/// Purpose of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    Enroll,
    Delete,
}

impl CaptureKind {
    fn awaiting_mode(self) -> CaptureMode {
        match self {
            Self::Enroll => CaptureMode::AwaitingEnroll,
            Self::Delete => CaptureMode::AwaitingDelete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enroll => "enroll",
            Self::Delete => "delete",
        }
    }
}

/// Scan swallowed by an active capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub kind: CaptureKind,
    pub uid: CardUid,
    pub captured_at: DateTime<Utc>,
}

/// Scan classified as attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceOutcome {
    pub student: Student,
    pub date: DateKey,
    pub status: AttendanceStatus,
    pub already: bool,
    pub recorded_time: Option<TimeOfDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanOutcome {
    Captured(CaptureOutcome),
    Attendance(AttendanceOutcome),
}

/// Attendance path a non-captured scan is handed to.
pub trait ScanSink {
    fn record_scan(&self, uid: &CardUid, now: DateTime<Utc>) -> ServiceResult<AttendanceOutcome>;
}

#[derive(Debug)]
struct CaptureSession {
    mode: CaptureMode,
    captured_uid: Option<CardUid>,
}

#[derive(Debug)]
pub struct CardSessionManager {
    session: Mutex<CaptureSession>,
}

impl Default for CardSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CardSessionManager {
    /// Creates an idle manager with no captured UID.
    pub fn new() -> Self {
        Self {
            session: Mutex::new(CaptureSession {
                mode: CaptureMode::Idle,
                captured_uid: None,
            }),
        }
    }

    pub fn start_enroll(&self) {
        self.start(CaptureKind::Enroll);
    }

    pub fn start_delete(&self) {
        self.start(CaptureKind::Delete);
    }

    pub fn start(&self, kind: CaptureKind) {
        let mut session = self.lock();
        let replaced = session.mode;
        session.mode = kind.awaiting_mode();
        session.captured_uid = None;
        info!(
            "event=capture_start module=session status=ok kind={} replaced={:?}",
            kind.as_str(),
            replaced
        );
    }

    pub fn cancel(&self) {
        let mut session = self.lock();
        session.mode = CaptureMode::Idle;
        session.captured_uid = None;
        info!("event=capture_cancel module=session status=ok");
    }

    /// Routes one scan.
    ///
    /// While a session awaits a card, the UID is stored and the session goes
    /// idle; otherwise the scan is handed to `sink` after the session lock is
    /// released.
    ///
    /// # Errors
    /// - `Validation` for a malformed UID, before any state change.
    /// - Whatever `sink` returns for attendance scans.
    pub fn consume<K>(
        &self,
        raw_uid: &str,
        now: DateTime<Utc>,
        sink: &K,
    ) -> ServiceResult<ScanOutcome>
    where
        K: ScanSink + ?Sized,
    {
        let uid = CardUid::parse(raw_uid)?;

        {
            let mut session = self.lock();
            let kind = match session.mode {
                CaptureMode::AwaitingEnroll => Some(CaptureKind::Enroll),
                CaptureMode::AwaitingDelete => Some(CaptureKind::Delete),
                CaptureMode::Idle => None,
            };
            if let Some(kind) = kind {
                session.mode = CaptureMode::Idle;
                session.captured_uid = Some(uid.clone());
                info!(
                    "event=capture module=session status=ok kind={} uid={}",
                    kind.as_str(),
                    uid.masked()
                );
                return Ok(ScanOutcome::Captured(CaptureOutcome {
                    kind,
                    uid,
                    captured_at: now,
                }));
            }
        }

        sink.record_scan(&uid, now).map(ScanOutcome::Attendance)
    }

    pub fn peek_captured_uid(&self) -> Option<CardUid> {
        self.lock().captured_uid.clone()
    }

    pub fn mode(&self) -> CaptureMode {
        self.lock().mode
    }

    fn lock(&self) -> MutexGuard<'_, CaptureSession> {
        // Every update leaves the session consistent, so a poisoned guard is
        // still valid state.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{AttendanceOutcome, CaptureMode, CardSessionManager, ScanOutcome, ScanSink};
    use crate::model::attendance::AttendanceStatus;
    use crate::model::calendar::DateKey;
    use crate::model::card::CardUid;
    use crate::model::student::Student;
    use crate::service::error::{ServiceError, ServiceResult};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    /// Records which UIDs reached the attendance path.
    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<String>>,
    }

    impl ScanSink for RecordingSink {
        fn record_scan(
            &self,
            uid: &CardUid,
            _now: DateTime<Utc>,
        ) -> ServiceResult<AttendanceOutcome> {
            self.seen.lock().unwrap().push(uid.to_string());
            Ok(AttendanceOutcome {
                student: Student {
                    id: 1,
                    name: "Test".to_string(),
                    card_uid: uid.clone(),
                },
                date: DateKey::parse("2024-09-16").unwrap(),
                status: AttendanceStatus::Present,
                already: false,
                recorded_time: None,
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 16, 8, 30, 0).unwrap()
    }

    #[test]
    fn enroll_capture_then_next_scan_is_attendance() {
        let manager = CardSessionManager::new();
        let sink = RecordingSink::default();

        manager.start_enroll();
        let captured = manager.consume("uid-A", now(), &sink).unwrap();
        assert!(matches!(captured, ScanOutcome::Captured(ref c) if c.uid.as_str() == "uid-A"));
        assert_eq!(manager.mode(), CaptureMode::Idle);
        assert_eq!(manager.peek_captured_uid().unwrap().as_str(), "uid-A");

        let routed = manager.consume("uid-B", now(), &sink).unwrap();
        assert!(matches!(routed, ScanOutcome::Attendance(_)));
        assert_eq!(*sink.seen.lock().unwrap(), vec!["uid-B".to_string()]);
        assert_eq!(manager.peek_captured_uid().unwrap().as_str(), "uid-A");
    }

    #[test]
    fn cancel_clears_session_and_routes_to_attendance() {
        let manager = CardSessionManager::new();
        let sink = RecordingSink::default();

        manager.start_enroll();
        manager.cancel();
        let routed = manager.consume("uid-A", now(), &sink).unwrap();

        assert!(matches!(routed, ScanOutcome::Attendance(_)));
        assert_eq!(manager.peek_captured_uid(), None);
        assert_eq!(*sink.seen.lock().unwrap(), vec!["uid-A".to_string()]);
    }

    #[test]
    fn new_session_replaces_previous_and_clears_capture() {
        let manager = CardSessionManager::new();
        let sink = RecordingSink::default();

        manager.start_enroll();
        manager.consume("uid-A", now(), &sink).unwrap();
        manager.start_delete();
        assert_eq!(manager.mode(), CaptureMode::AwaitingDelete);
        assert_eq!(manager.peek_captured_uid(), None);

        manager.start_enroll();
        assert_eq!(manager.mode(), CaptureMode::AwaitingEnroll);

        let captured = manager.consume("uid-C", now(), &sink).unwrap();
        match captured {
            ScanOutcome::Captured(outcome) => {
                assert_eq!(outcome.kind, super::CaptureKind::Enroll);
                assert_eq!(outcome.captured_at, now());
            }
            other => panic!("expected capture, got {other:?}"),
        }
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn outcomes_serialize_with_a_type_tag() {
        let manager = CardSessionManager::new();
        let sink = RecordingSink::default();

        manager.start_delete();
        let captured = manager.consume("uid-A", now(), &sink).unwrap();
        let routed = manager.consume("uid-A", now(), &sink).unwrap();

        let captured = serde_json::to_value(&captured).unwrap();
        assert_eq!(captured["type"], "captured");
        assert_eq!(captured["kind"], "delete");
        assert_eq!(captured["uid"], "uid-A");

        let routed = serde_json::to_value(&routed).unwrap();
        assert_eq!(routed["type"], "attendance");
        assert_eq!(routed["status"], "present");
        assert_eq!(routed["date"], "2024-09-16");
    }

    #[test]
    fn malformed_uid_is_rejected_without_touching_the_session() {
        let manager = CardSessionManager::new();
        let sink = RecordingSink::default();

        manager.start_delete();
        let err = manager.consume("   ", now(), &sink).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(manager.mode(), CaptureMode::AwaitingDelete);
        assert_eq!(manager.peek_captured_uid(), None);
    }
}
