use crate::domain::models::{ExternalEvent, Routine, Schedule, ScheduleStatus, DEFAULT_COLOR};
use crate::domain::time::DayWindow;
use chrono::NaiveDate;
use serde::Serialize;

/// One renderable entry in a day view. Exactly one of the three sources
/// backs each occurrence; consumers match exhaustively instead of probing
/// optional fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Occurrence {
    /// A persisted schedule row.
    Schedule(Schedule),
    /// A routine preview for a date it has not been materialized on.
    RoutineGhost { routine: Routine, date: NaiveDate },
    /// A read-only event from an external calendar feed.
    External(ExternalEvent),
}

impl Occurrence {
    pub fn id(&self) -> &str {
        match self {
            Occurrence::Schedule(schedule) => &schedule.id,
            Occurrence::RoutineGhost { routine, .. } => &routine.id,
            Occurrence::External(event) => &event.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Occurrence::Schedule(schedule) => &schedule.title,
            Occurrence::RoutineGhost { routine, .. } => &routine.title,
            Occurrence::External(event) => &event.title,
        }
    }

    pub fn start_time(&self) -> String {
        match self {
            Occurrence::Schedule(schedule) => schedule.start_time.clone(),
            Occurrence::RoutineGhost { routine, .. } => routine.start_time.clone(),
            Occurrence::External(event) => event.start_hhmm(),
        }
    }

    pub fn end_time(&self) -> String {
        match self {
            Occurrence::Schedule(schedule) => schedule.end_time.clone(),
            Occurrence::RoutineGhost { routine, .. } => routine.end_time.clone(),
            Occurrence::External(event) => event.end_hhmm(),
        }
    }

    pub fn color(&self) -> String {
        let color = match self {
            Occurrence::Schedule(schedule) => schedule.color.as_deref(),
            Occurrence::RoutineGhost { routine, .. } => routine.color.as_deref(),
            Occurrence::External(event) => event.color.as_deref(),
        };
        color.unwrap_or(DEFAULT_COLOR).to_string()
    }

    /// Sort key within an operating day. Ghosts and schedules at the same
    /// time keep a stable relative order from the merge.
    pub fn day_order(&self, window: DayWindow) -> u32 {
        window.day_minute(&self.start_time()).unwrap_or(0)
    }

    /// Ghosts and external events are never completed from our side.
    pub fn completed(&self) -> bool {
        matches!(
            self,
            Occurrence::Schedule(schedule) if schedule.status == ScheduleStatus::Completed
        )
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Occurrence::External(event) if event.is_all_day)
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, Occurrence::RoutineGhost { .. })
    }
}
