//! Attendance records and status transitions.
//!
//! # Invariants
//! - `Present` and `Late` are terminal for a date; only `Absent` may be
//!   upgraded by a later scan.
//! - `auto_marked` is true only for records created by reconciliation and
//!   not yet upgraded by a scan.

use super::calendar::{DateKey, TimeOfDay};
use super::student::StudentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Scanned before the lesson started.
    Present,
    /// Scanned at or after the lesson start.
    Late,
    /// No scan once the lesson started; set by reconciliation only.
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Absent => "absent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(Self::Present),
            "late" => Some(Self::Late),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }

    /// Whether a later scan on the same date must leave the record untouched.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }

    /// Classifies a scan against the lesson start.
    ///
    /// A scan at exactly the start minute is already late, matching the
    /// reconciliation rule that the lesson has begun once `now >= start`.
    pub fn for_scan(local_time: &TimeOfDay, start_time: &TimeOfDay) -> Self {
        if local_time >= start_time {
            Self::Late
        } else {
            Self::Present
        }
    }
}

/// One student's attendance on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: StudentId,
    pub date: DateKey,
    pub status: AttendanceStatus,
    /// Absolute scan instant for auditing; `None` for auto-marked absences.
    pub scan_time: Option<DateTime<Utc>>,
    /// Local `HH:MM` shown to people; independent from `scan_time`.
    pub recorded_time: Option<TimeOfDay>,
    pub auto_marked: bool,
}

impl AttendanceRecord {
    /// Record produced by a live card scan.
    pub fn scanned(
        student_id: StudentId,
        date: DateKey,
        status: AttendanceStatus,
        scan_time: DateTime<Utc>,
        recorded_time: TimeOfDay,
    ) -> Self {
        Self {
            student_id,
            date,
            status,
            scan_time: Some(scan_time),
            recorded_time: Some(recorded_time),
            auto_marked: false,
        }
    }

    /// Absence written by reconciliation for a student who never scanned.
    pub fn auto_absent(student_id: StudentId, date: DateKey, recorded_time: TimeOfDay) -> Self {
        Self {
            student_id,
            date,
            status: AttendanceStatus::Absent,
            scan_time: None,
            recorded_time: Some(recorded_time),
            auto_marked: true,
        }
    }
}

/// Raw status counts for one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    /// Enrolled students with no record yet.
    pub unrecorded: usize,
    pub enrolled: usize,
}
