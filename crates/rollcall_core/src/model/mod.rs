//! Attendance domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by the attendance services.
//! - Validate boundary representations (card UIDs, calendar keys, `HH:MM`
//!   times) once, so services only handle well-formed values.
//!
//! # Invariants
//! - Calendar keys are zero-padded `YYYY-MM-DD`, times are zero-padded
//!   `HH:MM`; both order correctly under plain string comparison.
//! - At most one `AttendanceRecord` exists per `(student_id, date)`.

pub mod attendance;
pub mod calendar;
pub mod card;
pub mod schedule;
pub mod student;
pub mod validation;
