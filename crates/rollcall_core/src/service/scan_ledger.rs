//! Bounded in-memory history of recent attendance scans.
//!
//! # Invariants
//! - Holds at most `capacity` events, newest first; the oldest is evicted.
//! - Not persisted and never consulted by classification or reconciliation.

use crate::model::attendance::AttendanceStatus;
use crate::model::card::CardUid;
use crate::model::student::StudentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanEventOutcome {
    Recorded {
        student_id: StudentId,
        student_name: String,
        status: AttendanceStatus,
        already: bool,
    },
    UnknownCard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub uid: CardUid,
    pub timestamp: DateTime<Utc>,
    pub outcome: ScanEventOutcome,
}

impl ScanEvent {
    /// Whether the card belonged to an enrolled student.
    pub fn found(&self) -> bool {
        matches!(self.outcome, ScanEventOutcome::Recorded { .. })
    }

    /// Short display line for history views.
    pub fn message(&self) -> String {
        match &self.outcome {
            ScanEventOutcome::Recorded {
                student_name,
                status,
                already: false,
                ..
            } => format!("{student_name}: {}", status.as_str()),
            ScanEventOutcome::Recorded {
                student_name,
                status,
                already: true,
                ..
            } => format!("{student_name}: already recorded as {}", status.as_str()),
            ScanEventOutcome::UnknownCard => "unknown card".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ScanLedger {
    capacity: usize,
    events: Mutex<VecDeque<ScanEvent>>,
}

impl ScanLedger {
    /// Creates an empty ledger; a zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, event: ScanEvent) {
        let mut events = self.lock();
        if events.len() == self.capacity {
            events.pop_back();
        }
        events.push_front(event);
    }

    /// Snapshot copy, newest first.
    pub fn list(&self) -> Vec<ScanEvent> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ScanEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
