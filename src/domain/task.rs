//! Task schedule as supplied by the external scheduler
//!
//! The engine only reads tasks; it never creates or moves them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::id::TaskId;

/// A task's current schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    #[serde(alias = "start_date", alias = "startDate")]
    pub start: DateTime<Utc>,

    #[serde(alias = "end_date", alias = "endDate")]
    pub end: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { id, start, end }
    }

    /// Creates a task spanning whole calendar dates (midnight UTC)
    pub fn on_dates(id: TaskId, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id,
            start: start.and_time(chrono::NaiveTime::MIN).and_utc(),
            end: end.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }

    /// Returns true if the schedule is well-formed (end >= start)
    pub fn is_well_formed(&self) -> bool {
        self.end >= self.start
    }
}
