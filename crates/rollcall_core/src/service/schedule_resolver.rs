//! Effective schedule lookup.
//!
//! # Invariants
//! - A per-date override always wins over the global schedule.
//! - Nothing is cached: an edit is visible to the very next `resolve`.

use super::error::ServiceResult;
use crate::model::calendar::DateKey;
use crate::model::schedule::{EffectiveSchedule, LessonSchedule};
use crate::repo::schedule_repo::ScheduleRepository;
use std::sync::Arc;

pub struct ScheduleResolver<S> {
    store: Arc<S>,
    fallback: LessonSchedule,
}

impl<S: ScheduleRepository> ScheduleResolver<S> {
    /// `fallback` applies while no global schedule has been stored.
    pub fn new(store: Arc<S>, fallback: LessonSchedule) -> Self {
        Self { store, fallback }
    }

    pub fn resolve(&self, date: &DateKey) -> ServiceResult<EffectiveSchedule> {
        if let Some(custom) = self.store.find_schedule_override(date)? {
            return Ok(EffectiveSchedule {
                start_time: custom.schedule.start_time,
                end_time: custom.schedule.end_time,
                is_custom: true,
            });
        }

        let global = self
            .store
            .get_global_schedule()?
            .unwrap_or_else(|| self.fallback.clone());
        Ok(EffectiveSchedule {
            start_time: global.start_time,
            end_time: global.end_time,
            is_custom: false,
        })
    }
}
