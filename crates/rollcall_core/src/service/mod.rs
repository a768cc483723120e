//! Attendance use-case services.
//!
//! # Responsibility
//! - Hold the invariants of capture sessions, classification and
//!   reconciliation above the repository layer.
//! - Keep the serving layer decoupled from storage through `AttendanceDesk`.
//!
//! # Invariants
//! - Services never bypass repository conditional-write contracts.
//! - Services remain storage-agnostic (`AttendanceStore` bound only).

pub mod attendance_classifier;
pub mod attendance_desk;
pub mod card_session;
pub mod error;
pub mod reconciliation;
pub mod roster_service;
pub mod scan_ledger;
pub mod schedule_resolver;
