use crate::application::{next_id, NowProvider};
use crate::domain::models::{Routine, Schedule, ScheduleItem, ScheduleStatus};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::repository::{RoutineRepository, ScheduleRepository};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of one materialization sweep. Failures are collected per routine
/// so one broken routine never blocks the rest.
#[derive(Debug, Clone, Default)]
pub struct MaterializeReport {
    pub created: Vec<Schedule>,
    pub skipped_existing: usize,
    pub failed: Vec<MaterializeFailure>,
}

#[derive(Debug, Clone)]
pub struct MaterializeFailure {
    pub routine_id: String,
    pub message: String,
}

pub struct RoutineEngine<R, S>
where
    R: RoutineRepository,
    S: ScheduleRepository,
{
    routines: Arc<R>,
    schedules: Arc<S>,
    now_provider: NowProvider,
}

impl<R, S> RoutineEngine<R, S>
where
    R: RoutineRepository,
    S: ScheduleRepository,
{
    pub fn new(routines: Arc<R>, schedules: Arc<S>) -> Self {
        Self {
            routines,
            schedules,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Routines that produce an occurrence on `date`: active, inside their
    /// date window, and listing the date's weekday.
    pub async fn occurrences_active_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Routine>, PlannerError> {
        Ok(self
            .routines
            .list_routines()
            .await?
            .into_iter()
            .filter(|routine| routine.is_active_on(date))
            .collect())
    }

    /// Turns every auto-scheduling routine due on `date` into a persisted
    /// schedule, skipping ones that already have a row for that day. Safe to
    /// run repeatedly; reruns create nothing new.
    pub async fn materialize_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<MaterializeReport, PlannerError> {
        let due = self.occurrences_active_on(date).await?;
        let existing: HashSet<String> = self
            .schedules
            .list_schedules_on(date)
            .await?
            .into_iter()
            .filter_map(|schedule| schedule.routine_id)
            .collect();

        let mut report = MaterializeReport::default();
        for routine in due {
            if !routine.auto_schedule {
                continue;
            }
            if existing.contains(&routine.id) {
                report.skipped_existing += 1;
                continue;
            }
            let schedule = self.schedule_from_routine(&routine, date);
            match self.schedules.insert_schedule(schedule).await {
                Ok(created) => report.created.push(created),
                // Another client won the race for this routine and day.
                Err(PlannerError::DuplicateOccurrence { .. }) => {
                    report.skipped_existing += 1;
                }
                Err(error) => report.failed.push(MaterializeFailure {
                    routine_id: routine.id.clone(),
                    message: error.to_string(),
                }),
            }
        }
        Ok(report)
    }

    /// Converts a single routine ghost into a persisted schedule for `date`.
    pub async fn materialize_routine(
        &self,
        routine_id: &str,
        date: NaiveDate,
    ) -> Result<Schedule, PlannerError> {
        let routine = self
            .routines
            .get_routine(routine_id)
            .await?
            .ok_or_else(|| PlannerError::NotFound(format!("routine {routine_id}")))?;
        if !routine.is_active_on(date) {
            return Err(PlannerError::Validation(format!(
                "routine {routine_id} is not active on {date}"
            )));
        }
        self.schedules
            .insert_schedule(self.schedule_from_routine(&routine, date))
            .await
    }

    fn schedule_from_routine(&self, routine: &Routine, date: NaiveDate) -> Schedule {
        Schedule {
            id: next_id("sch"),
            title: routine.title.clone(),
            description: routine.description.clone(),
            date,
            start_time: routine.start_time.clone(),
            end_time: routine.end_time.clone(),
            color: routine.color.clone(),
            status: ScheduleStatus::Planned,
            items: routine
                .items
                .iter()
                .map(|title| ScheduleItem {
                    id: next_id("itm"),
                    title: title.clone(),
                    completed: false,
                })
                .collect(),
            task_id: None,
            routine_id: Some(routine.id.clone()),
            google_event_id: None,
            original_date: None,
            original_start_time: None,
            original_end_time: None,
            modified_at: None,
            reschedule_reason: None,
            created_at: (self.now_provider)(),
        }
    }
}
