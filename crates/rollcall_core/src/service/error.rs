//! Service-level error taxonomy.

use crate::model::card::CardUid;
use crate::model::student::StudentId;
use crate::model::validation::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by attendance services to the serving layer.
#[derive(Debug)]
pub enum ServiceError {
    /// Malformed uid, date, time or name; nothing changed.
    Validation(ValidationError),
    /// No student is enrolled with this card.
    UnknownCard(CardUid),
    /// No student has this id.
    StudentNotFound(StudentId),
    /// Write rejected because conflicting state already exists.
    Conflict(String),
    /// Storage failed; the operation was aborted.
    Storage(RepoError),
}

/// Coarse class of a `ServiceError`, for mapping onto transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::UnknownCard(_) | Self::StudentNotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UnknownCard(uid) => write!(f, "no student enrolled with card {}", uid.masked()),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::UnknownCard(_) | Self::StudentNotFound(_) | Self::Conflict(_) => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Storage(other),
        }
    }
}
