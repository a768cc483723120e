//! Repository contracts and the SQLite persistence implementation.
//!
//! # Responsibility
//! - Define the storage operations the attendance services need.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `(student_id, date)` uniqueness is enforced by storage, not by callers.
//! - Conditional writes report whether they applied instead of failing, so
//!   races surface as `false` rather than as errors.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod attendance_repo;
pub mod schedule_repo;
pub mod sqlite_store;
pub mod student_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-level failure for repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Write rejected by a uniqueness constraint.
    Conflict(String),
    /// Target row does not exist.
    NotFound(String),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection mutex was poisoned by a panicking writer.
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::LockPoisoned => write!(f, "storage connection lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Conflict(_) => None,
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
            Self::LockPoisoned => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Everything the attendance services need from storage.
///
/// Blanket-implemented for any type providing the three repositories.
pub trait AttendanceStore:
    student_repo::StudentRepository
    + attendance_repo::AttendanceRepository
    + schedule_repo::ScheduleRepository
    + Send
    + Sync
{
}

impl<T> AttendanceStore for T where
    T: student_repo::StudentRepository
        + attendance_repo::AttendanceRepository
        + schedule_repo::ScheduleRepository
        + Send
        + Sync
{
}
