//! Enrolled student model.

use super::card::CardUid;
use super::validation::ValidationError;
use serde::{Deserialize, Serialize};

/// Storage-assigned student identifier.
pub type StudentId = i64;

/// Enrolled student bound to exactly one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub card_uid: CardUid,
}

/// Trims a display name and rejects blank input.
pub fn normalize_student_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankName);
    }
    Ok(trimmed.to_string())
}
