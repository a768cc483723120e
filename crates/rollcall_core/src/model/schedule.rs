//! Lesson schedule windows.

use super::calendar::{DateKey, TimeOfDay};
use super::validation::ValidationError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_START_TIME: &str = "09:00";
pub const DEFAULT_END_TIME: &str = "10:00";

/// Lesson window; `start_time` is strictly before `end_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSchedule {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

impl LessonSchedule {
    pub fn new(start_time: TimeOfDay, end_time: TimeOfDay) -> Result<Self, ValidationError> {
        if start_time >= end_time {
            return Err(ValidationError::InvertedSchedule {
                start: start_time.into(),
                end: end_time.into(),
            });
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    /// Parses raw `HH:MM` strings into a validated window.
    pub fn parse(start_time: &str, end_time: &str) -> Result<Self, ValidationError> {
        Self::new(TimeOfDay::parse(start_time)?, TimeOfDay::parse(end_time)?)
    }
}

impl Default for LessonSchedule {
    fn default() -> Self {
        Self {
            start_time: TimeOfDay::from_hm(9, 0),
            end_time: TimeOfDay::from_hm(10, 0),
        }
    }
}

/// Per-date schedule that wins over the global default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOverride {
    pub date: DateKey,
    pub schedule: LessonSchedule,
}

/// Schedule in force for one date after resolving overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveSchedule {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub is_custom: bool,
}

/// Which schedule a `set_schedule` call wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleScope {
    Global,
    Custom,
}
