use crate::domain::models::{Routine, Schedule, Task, Week};
use crate::infrastructure::error::PlannerError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, PlannerError>;
    async fn get_task(&self, id: &str) -> Result<Option<Task>, PlannerError>;
    async fn insert_task(&self, task: Task) -> Result<Task, PlannerError>;
    async fn update_task(&self, task: Task) -> Result<Task, PlannerError>;
    async fn delete_task(&self, id: &str) -> Result<(), PlannerError>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn list_schedules(&self) -> Result<Vec<Schedule>, PlannerError>;
    async fn list_schedules_on(&self, date: NaiveDate) -> Result<Vec<Schedule>, PlannerError>;
    async fn list_schedules_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Schedule>, PlannerError>;
    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, PlannerError>;
    /// Inserts a schedule. Fails with `DuplicateOccurrence` when another
    /// schedule already holds the same `(routine_id, date)` pair.
    async fn insert_schedule(&self, schedule: Schedule) -> Result<Schedule, PlannerError>;
    async fn update_schedule(&self, schedule: Schedule) -> Result<Schedule, PlannerError>;
    async fn delete_schedule(&self, id: &str) -> Result<(), PlannerError>;
}

#[async_trait]
pub trait RoutineRepository: Send + Sync {
    async fn list_routines(&self) -> Result<Vec<Routine>, PlannerError>;
    async fn get_routine(&self, id: &str) -> Result<Option<Routine>, PlannerError>;
    async fn insert_routine(&self, routine: Routine) -> Result<Routine, PlannerError>;
    async fn update_routine(&self, routine: Routine) -> Result<Routine, PlannerError>;
    async fn delete_routine(&self, id: &str) -> Result<(), PlannerError>;
}

#[async_trait]
pub trait WeekRepository: Send + Sync {
    async fn get_week(&self, week_id: &str) -> Result<Option<Week>, PlannerError>;
    async fn get_or_create_week(
        &self,
        week_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Week, PlannerError>;
    async fn update_week(&self, week: Week) -> Result<Week, PlannerError>;
}

/// In-memory store backing all four repositories, for tests and offline use.
#[derive(Debug, Default)]
pub struct InMemoryPlannerStore {
    tasks: Mutex<HashMap<String, Task>>,
    schedules: Mutex<HashMap<String, Schedule>>,
    routines: Mutex<HashMap<String, Routine>>,
    weeks: Mutex<HashMap<String, Week>>,
}

impl InMemoryPlannerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    name: &str,
) -> Result<std::sync::MutexGuard<'a, T>, PlannerError> {
    mutex
        .lock()
        .map_err(|error| PlannerError::Provider(format!("{name} lock poisoned: {error}")))
}

#[async_trait]
impl TaskRepository for InMemoryPlannerStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, PlannerError> {
        let tasks = lock(&self.tasks, "tasks")?;
        let mut listed: Vec<Task> = tasks.values().cloned().collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, PlannerError> {
        let tasks = lock(&self.tasks, "tasks")?;
        Ok(tasks.get(id).cloned())
    }

    async fn insert_task(&self, task: Task) -> Result<Task, PlannerError> {
        let mut tasks = lock(&self.tasks, "tasks")?;
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_task(&self, task: Task) -> Result<Task, PlannerError> {
        let mut tasks = lock(&self.tasks, "tasks")?;
        if !tasks.contains_key(&task.id) {
            return Err(PlannerError::NotFound(format!("task {}", task.id)));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn delete_task(&self, id: &str) -> Result<(), PlannerError> {
        let mut tasks = lock(&self.tasks, "tasks")?;
        tasks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PlannerError::NotFound(format!("task {id}")))
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryPlannerStore {
    async fn list_schedules(&self) -> Result<Vec<Schedule>, PlannerError> {
        let schedules = lock(&self.schedules, "schedules")?;
        let mut listed: Vec<Schedule> = schedules.values().cloned().collect();
        listed.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.start_time.cmp(&b.start_time))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(listed)
    }

    async fn list_schedules_on(&self, date: NaiveDate) -> Result<Vec<Schedule>, PlannerError> {
        Ok(self
            .list_schedules()
            .await?
            .into_iter()
            .filter(|schedule| schedule.date == date)
            .collect())
    }

    async fn list_schedules_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Schedule>, PlannerError> {
        Ok(self
            .list_schedules()
            .await?
            .into_iter()
            .filter(|schedule| schedule.date >= from && schedule.date <= to)
            .collect())
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, PlannerError> {
        let schedules = lock(&self.schedules, "schedules")?;
        Ok(schedules.get(id).cloned())
    }

    async fn insert_schedule(&self, schedule: Schedule) -> Result<Schedule, PlannerError> {
        let mut schedules = lock(&self.schedules, "schedules")?;
        if let Some(routine_id) = schedule.routine_id.as_deref() {
            let taken = schedules.values().any(|existing| {
                existing.routine_id.as_deref() == Some(routine_id)
                    && existing.date == schedule.date
            });
            if taken {
                return Err(PlannerError::DuplicateOccurrence {
                    routine_id: routine_id.to_string(),
                    date: schedule.date.format("%Y-%m-%d").to_string(),
                });
            }
        }
        schedules.insert(schedule.id.clone(), schedule.clone());
        Ok(schedule)
    }

    async fn update_schedule(&self, schedule: Schedule) -> Result<Schedule, PlannerError> {
        let mut schedules = lock(&self.schedules, "schedules")?;
        if !schedules.contains_key(&schedule.id) {
            return Err(PlannerError::NotFound(format!("schedule {}", schedule.id)));
        }
        schedules.insert(schedule.id.clone(), schedule.clone());
        Ok(schedule)
    }

    async fn delete_schedule(&self, id: &str) -> Result<(), PlannerError> {
        let mut schedules = lock(&self.schedules, "schedules")?;
        schedules
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PlannerError::NotFound(format!("schedule {id}")))
    }
}

#[async_trait]
impl RoutineRepository for InMemoryPlannerStore {
    async fn list_routines(&self) -> Result<Vec<Routine>, PlannerError> {
        let routines = lock(&self.routines, "routines")?;
        let mut listed: Vec<Routine> = routines.values().cloned().collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn get_routine(&self, id: &str) -> Result<Option<Routine>, PlannerError> {
        let routines = lock(&self.routines, "routines")?;
        Ok(routines.get(id).cloned())
    }

    async fn insert_routine(&self, routine: Routine) -> Result<Routine, PlannerError> {
        let mut routines = lock(&self.routines, "routines")?;
        routines.insert(routine.id.clone(), routine.clone());
        Ok(routine)
    }

    async fn update_routine(&self, routine: Routine) -> Result<Routine, PlannerError> {
        let mut routines = lock(&self.routines, "routines")?;
        if !routines.contains_key(&routine.id) {
            return Err(PlannerError::NotFound(format!("routine {}", routine.id)));
        }
        routines.insert(routine.id.clone(), routine.clone());
        Ok(routine)
    }

    async fn delete_routine(&self, id: &str) -> Result<(), PlannerError> {
        let mut routines = lock(&self.routines, "routines")?;
        routines
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PlannerError::NotFound(format!("routine {id}")))
    }
}

#[async_trait]
impl WeekRepository for InMemoryPlannerStore {
    async fn get_week(&self, week_id: &str) -> Result<Option<Week>, PlannerError> {
        let weeks = lock(&self.weeks, "weeks")?;
        Ok(weeks.get(week_id).cloned())
    }

    async fn get_or_create_week(
        &self,
        week_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Week, PlannerError> {
        let mut weeks = lock(&self.weeks, "weeks")?;
        if let Some(existing) = weeks.get(week_id) {
            return Ok(existing.clone());
        }
        let week = Week {
            id: week_id.to_string(),
            start_date,
            end_date,
            goals: Vec::new(),
            weekly_goals: Vec::new(),
        };
        weeks.insert(week_id.to_string(), week.clone());
        Ok(week)
    }

    async fn update_week(&self, week: Week) -> Result<Week, PlannerError> {
        let mut weeks = lock(&self.weeks, "weeks")?;
        if !weeks.contains_key(&week.id) {
            return Err(PlannerError::NotFound(format!("week {}", week.id)));
        }
        weeks.insert(week.id.clone(), week.clone());
        Ok(week)
    }
}
