//! Core attendance logic for Rollcall card readers.
//! This crate is the single source of truth for attendance invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod ticker;

pub use clock::{Clock, LocalStamp, LocalZone, ManualClock, SystemClock};
pub use config::{ConfigError, RollcallConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
pub use model::calendar::{DateKey, TimeOfDay};
pub use model::card::CardUid;
pub use model::schedule::{EffectiveSchedule, LessonSchedule, ScheduleScope};
pub use model::student::{Student, StudentId};
pub use model::validation::ValidationError;
pub use repo::sqlite_store::SqliteStore;
pub use repo::{AttendanceStore, RepoError, RepoResult};
pub use service::attendance_desk::{AttendanceDesk, DeskSettings};
pub use service::card_session::{
    AttendanceOutcome, CaptureKind, CaptureMode, CaptureOutcome, ScanOutcome,
};
pub use service::error::{ErrorKind, ServiceError, ServiceResult};
pub use service::reconciliation::{LessonPhase, ReconciliationReport, TickOutcome};
pub use service::scan_ledger::{ScanEvent, ScanEventOutcome};
pub use ticker::ReconciliationTicker;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
