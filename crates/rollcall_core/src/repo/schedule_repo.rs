//! Schedule repository contract.

use super::RepoResult;
use crate::model::calendar::DateKey;
use crate::model::schedule::{LessonSchedule, ScheduleOverride};

pub trait ScheduleRepository {
    fn find_schedule_override(&self, date: &DateKey) -> RepoResult<Option<ScheduleOverride>>;
    fn upsert_schedule_override(&self, schedule: &ScheduleOverride) -> RepoResult<()>;
    /// No-op when `date` has no override.
    fn delete_schedule_override(&self, date: &DateKey) -> RepoResult<()>;
    /// `None` until a global schedule was stored.
    fn get_global_schedule(&self) -> RepoResult<Option<LessonSchedule>>;
    fn upsert_global_schedule(&self, schedule: &LessonSchedule) -> RepoResult<()>;
    fn clear_global_schedule(&self) -> RepoResult<()>;
}
