//! Validation errors raised while parsing boundary values.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejection reasons for malformed caller input.
///
/// Every variant maps to the "validation" class of errors: the request is
/// refused synchronously and no state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Card UID is empty after trimming.
    EmptyCardUid,
    /// Card UID exceeds the accepted length.
    CardUidTooLong { len: usize, max: usize },
    /// Card UID contains control characters.
    CardUidControlChars,
    /// Date is not a zero-padded `YYYY-MM-DD` calendar key.
    MalformedDate(String),
    /// Time is not a zero-padded `HH:MM` value.
    MalformedTime(String),
    /// Student name is blank after trimming.
    BlankName,
    /// Lesson start must be strictly before lesson end.
    InvertedSchedule { start: String, end: String },
    /// UTC offset is not `+HH:MM`/`-HH:MM` or is out of range.
    MalformedOffset(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCardUid => write!(f, "card uid must not be empty"),
            Self::CardUidTooLong { len, max } => {
                write!(f, "card uid is {len} characters long, maximum is {max}")
            }
            Self::CardUidControlChars => write!(f, "card uid must not contain control characters"),
            Self::MalformedDate(value) => {
                write!(f, "date `{value}` is not a YYYY-MM-DD calendar key")
            }
            Self::MalformedTime(value) => write!(f, "time `{value}` is not a zero-padded HH:MM"),
            Self::BlankName => write!(f, "student name must not be blank"),
            Self::InvertedSchedule { start, end } => {
                write!(f, "lesson start {start} must be before lesson end {end}")
            }
            Self::MalformedOffset(value) => {
                write!(f, "utc offset `{value}` is not in +HH:MM form")
            }
        }
    }
}

impl Error for ValidationError {}
