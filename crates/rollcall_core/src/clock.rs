//! Injectable time source and fixed-offset local time.
//!
//! # Responsibility
//! - Provide the only way services learn "now".
//! - Convert absolute instants into the school's local `YYYY-MM-DD` and
//!   `HH:MM` pair with one configured UTC offset.
//!
//! # Invariants
//! - Local conversion never consults the host locale or `TZ`.
//! - A `LocalStamp` always carries the instant it was derived from, so audit
//!   time and display time never drift apart.

use crate::model::calendar::{DateKey, TimeOfDay};
use crate::model::validation::ValidationError;
use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of absolute time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, step: TimeDelta) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Instant plus its local calendar key and minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStamp {
    pub instant: DateTime<Utc>,
    pub date: DateKey,
    pub time: TimeOfDay,
}

/// Fixed UTC offset the school operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalZone {
    offset: FixedOffset,
}

impl LocalZone {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Parses `+HH:MM` / `-HH:MM` (also accepts `Z`).
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("z") {
            return Ok(Self::utc());
        }
        let malformed = || ValidationError::MalformedOffset(raw.to_string());

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(malformed()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(malformed)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(hours) || !two_digits(minutes) {
            return Err(malformed());
        }
        let hours: i32 = hours.parse().map_err(|_| malformed())?;
        let minutes: i32 = minutes.parse().map_err(|_| malformed())?;
        if hours > 14 || minutes > 59 {
            return Err(malformed());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::new)
            .ok_or_else(malformed)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Projects an instant onto the local calendar.
    pub fn stamp(&self, instant: DateTime<Utc>) -> LocalStamp {
        let local = instant.with_timezone(&self.offset);
        LocalStamp {
            instant,
            date: DateKey::from_naive(local.date_naive()),
            time: TimeOfDay::from_naive(local.time()),
        }
    }
}

impl Default for LocalZone {
    fn default() -> Self {
        Self::utc()
    }
}
