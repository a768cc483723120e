//! Calendar keys and local times-of-day.
//!
//! # Invariants
//! - `DateKey` is always a zero-padded `YYYY-MM-DD` naming a real date.
//! - `TimeOfDay` is always a zero-padded `HH:MM` in `00:00..=23:59`.
//! - Both derive `Ord` from their text, which matches chronological order
//!   because the width is fixed.

use super::validation::ValidationError;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Timezone-anchored calendar day, e.g. `2024-09-16`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(String);

impl DateKey {
    /// Parses a `YYYY-MM-DD` key, rejecting unpadded or impossible dates.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let date = NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map_err(|_| ValidationError::MalformedDate(raw.to_string()))?;
        let canonical = Self::from_naive(date);
        if canonical.0 != trimmed {
            return Err(ValidationError::MalformedDate(raw.to_string()));
        }
        Ok(canonical)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date.format(DATE_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DateKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DateKey> for String {
    fn from(value: DateKey) -> Self {
        value.0
    }
}

/// Local wall-clock minute, e.g. `09:05`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(String);

impl TimeOfDay {
    /// Parses a zero-padded `HH:MM` value.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let time = NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
            .map_err(|_| ValidationError::MalformedTime(raw.to_string()))?;
        let canonical = Self::from_naive(time);
        if canonical.0 != trimmed {
            return Err(ValidationError::MalformedTime(raw.to_string()));
        }
        Ok(canonical)
    }

    /// Truncates to the minute; seconds never influence classification.
    pub fn from_naive(time: NaiveTime) -> Self {
        Self(time.format(TIME_FORMAT).to_string())
    }

    /// Builds a time from in-range components known at compile time.
    pub(crate) fn from_hm(hour: u32, minute: u32) -> Self {
        debug_assert!(hour < 24 && minute < 60);
        Self(format!("{hour:02}:{minute:02}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::{DateKey, TimeOfDay};
    use crate::model::validation::ValidationError;

    #[test]
    fn date_key_requires_zero_padding_and_real_dates() {
        assert_eq!(DateKey::parse("2024-09-16").unwrap().as_str(), "2024-09-16");
        assert!(matches!(
            DateKey::parse("2024-9-16"),
            Err(ValidationError::MalformedDate(_))
        ));
        assert!(DateKey::parse("2024-02-30").is_err());
        assert!(DateKey::parse("").is_err());
    }

    #[test]
    fn time_of_day_requires_zero_padding() {
        assert_eq!(TimeOfDay::parse("09:05").unwrap().as_str(), "09:05");
        assert!(matches!(
            TimeOfDay::parse("9:05"),
            Err(ValidationError::MalformedTime(_))
        ));
        assert!(TimeOfDay::parse("24:00").is_err());
        assert!(TimeOfDay::parse("09:05:00").is_err());
    }

    #[test]
    fn string_order_matches_clock_order() {
        let early = TimeOfDay::parse("08:59").unwrap();
        let start = TimeOfDay::parse("09:00").unwrap();
        let late = TimeOfDay::parse("10:30").unwrap();
        assert!(early < start);
        assert!(start < late);
        assert!(DateKey::parse("2024-09-30").unwrap() < DateKey::parse("2024-10-01").unwrap());
    }
}
