use crate::application::{next_id, NowProvider};
use crate::domain::models::{
    validate_non_empty, Schedule, ScheduleItem, ScheduleStatus, TaskStatus,
};
use crate::domain::time::{add_minutes, validate_hhmm, TIMELINE_WINDOW};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::repository::{RoutineRepository, ScheduleRepository, TaskRepository};
use chrono::{Duration, NaiveDate, Timelike, Utc};
use std::sync::Arc;

const DEFAULT_PLACEMENT_MINUTES: u32 = 60;

/// Whether an edit or delete of a routine-linked schedule touches only that
/// day's occurrence or the routine going forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditScope {
    TodayOnly,
    AllFuture,
}

#[derive(Debug, Clone)]
pub struct ScheduleDraft {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub color: Option<String>,
    pub items: Vec<String>,
    pub task_id: Option<String>,
}

/// Field-wise changes for an edit; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ScheduleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub color: Option<String>,
}

/// Result of the two-step task placement. The schedule insert and the task
/// status update are separate writes; when the second one fails the
/// placement stands and the caller gets a warning instead of an error.
#[derive(Debug, Clone)]
pub struct PlacementOutcome {
    pub schedule: Schedule,
    pub task_status_updated: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub completed_schedule_ids: Vec<String>,
}

pub struct ScheduleService<S, R, T>
where
    S: ScheduleRepository,
    R: RoutineRepository,
    T: TaskRepository,
{
    schedules: Arc<S>,
    routines: Arc<R>,
    tasks: Arc<T>,
    now_provider: NowProvider,
}

impl<S, R, T> ScheduleService<S, R, T>
where
    S: ScheduleRepository,
    R: RoutineRepository,
    T: TaskRepository,
{
    pub fn new(schedules: Arc<S>, routines: Arc<R>, tasks: Arc<T>) -> Self {
        Self {
            schedules,
            routines,
            tasks,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn create_schedule(&self, draft: ScheduleDraft) -> Result<Schedule, PlannerError> {
        let title = draft.title.trim();
        validate_non_empty(title, "schedule.title").map_err(PlannerError::Validation)?;
        validate_hhmm(&draft.start_time, "schedule.start_time")
            .map_err(PlannerError::Validation)?;
        validate_hhmm(&draft.end_time, "schedule.end_time").map_err(PlannerError::Validation)?;

        let schedule = Schedule {
            id: next_id("sch"),
            title: title.to_string(),
            description: draft
                .description
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            color: draft.color,
            status: ScheduleStatus::Planned,
            items: draft
                .items
                .iter()
                .map(|item_title| item_title.trim())
                .filter(|item_title| !item_title.is_empty())
                .map(|item_title| ScheduleItem {
                    id: next_id("itm"),
                    title: item_title.to_string(),
                    completed: false,
                })
                .collect(),
            task_id: draft.task_id,
            routine_id: None,
            google_event_id: None,
            original_date: None,
            original_start_time: None,
            original_end_time: None,
            modified_at: None,
            reschedule_reason: None,
            created_at: (self.now_provider)(),
        };
        self.schedules.insert_schedule(schedule).await
    }

    /// Edits one schedule. With `AllFuture` scope on a routine-linked
    /// schedule the changed fields are also pushed onto the routine, so
    /// every later occurrence picks them up.
    pub async fn update_schedule(
        &self,
        schedule_id: &str,
        changes: ScheduleChanges,
        scope: EditScope,
    ) -> Result<Schedule, PlannerError> {
        let mut schedule = self.require_schedule(schedule_id).await?;

        if let Some(title) = changes.title.as_deref() {
            let title = title.trim();
            validate_non_empty(title, "schedule.title").map_err(PlannerError::Validation)?;
            schedule.title = title.to_string();
        }
        if let Some(description) = changes.description.as_deref() {
            let description = description.trim();
            schedule.description = if description.is_empty() {
                None
            } else {
                Some(description.to_string())
            };
        }
        if let Some(start_time) = changes.start_time.clone() {
            validate_hhmm(&start_time, "schedule.start_time")
                .map_err(PlannerError::Validation)?;
            schedule.start_time = start_time;
        }
        if let Some(end_time) = changes.end_time.clone() {
            validate_hhmm(&end_time, "schedule.end_time").map_err(PlannerError::Validation)?;
            schedule.end_time = end_time;
        }
        if let Some(color) = changes.color.clone() {
            schedule.color = Some(color);
        }

        let updated = self.schedules.update_schedule(schedule).await?;

        if scope == EditScope::AllFuture {
            if let Some(routine_id) = updated.routine_id.as_deref() {
                let mut routine = self
                    .routines
                    .get_routine(routine_id)
                    .await?
                    .ok_or_else(|| PlannerError::NotFound(format!("routine {routine_id}")))?;
                routine.title = updated.title.clone();
                routine.start_time = updated.start_time.clone();
                routine.end_time = updated.end_time.clone();
                routine.items = updated.items.iter().map(|item| item.title.clone()).collect();
                if updated.color.is_some() {
                    routine.color = updated.color.clone();
                }
                if changes.description.is_some() {
                    routine.description = updated.description.clone();
                }
                self.routines.update_routine(routine).await?;
            }
        }
        Ok(updated)
    }

    /// Deletes a schedule. With `AllFuture` scope on a routine-linked
    /// schedule the routine's end date is pulled back to the day before the
    /// deleted occurrence and already-materialized rows from that day on are
    /// removed with it.
    pub async fn delete_schedule(
        &self,
        schedule_id: &str,
        scope: EditScope,
    ) -> Result<(), PlannerError> {
        let schedule = self.require_schedule(schedule_id).await?;
        let routine_id = schedule.routine_id.clone();
        let task_id = schedule.task_id.clone();

        self.schedules.delete_schedule(schedule_id).await?;

        if scope == EditScope::AllFuture {
            if let Some(routine_id) = routine_id {
                if let Some(mut routine) = self.routines.get_routine(&routine_id).await? {
                    routine.end_date = Some(schedule.date - Duration::days(1));
                    if routine.end_date < Some(routine.start_date) {
                        routine.is_active = false;
                        routine.end_date = Some(routine.start_date);
                    }
                    self.routines.update_routine(routine).await?;
                }
                let leftovers = self.schedules.list_schedules().await?;
                for leftover in leftovers {
                    if leftover.routine_id.as_deref() == Some(routine_id.as_str())
                        && leftover.date >= schedule.date
                    {
                        self.schedules.delete_schedule(&leftover.id).await?;
                    }
                }
            }
        }

        // Losing its only schedule sends a placed task back to the backlog.
        if let Some(task_id) = task_id {
            if !self.is_task_scheduled(&task_id).await? {
                if let Some(mut task) = self.tasks.get_task(&task_id).await? {
                    if task.status == TaskStatus::Scheduled {
                        task.status = TaskStatus::Backlog;
                        self.tasks.update_task(task).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Moves a schedule to a new date or time. The pre-move coordinates are
    /// recorded once; later moves keep the earliest originals.
    pub async fn reschedule(
        &self,
        schedule_id: &str,
        new_date: NaiveDate,
        new_start: String,
        new_end: String,
        reason: Option<String>,
    ) -> Result<Schedule, PlannerError> {
        validate_hhmm(&new_start, "schedule.start_time").map_err(PlannerError::Validation)?;
        validate_hhmm(&new_end, "schedule.end_time").map_err(PlannerError::Validation)?;

        let mut schedule = self.require_schedule(schedule_id).await?;
        if schedule.original_date.is_none() {
            schedule.original_date = Some(schedule.date);
            schedule.original_start_time = Some(schedule.start_time.clone());
            schedule.original_end_time = Some(schedule.end_time.clone());
        }
        schedule.date = new_date;
        schedule.start_time = new_start;
        schedule.end_time = new_end;
        schedule.status = ScheduleStatus::Rescheduled;
        schedule.modified_at = Some((self.now_provider)());
        schedule.reschedule_reason = reason
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);
        self.schedules.update_schedule(schedule).await
    }

    pub async fn add_item(
        &self,
        schedule_id: &str,
        title: &str,
    ) -> Result<Schedule, PlannerError> {
        let title = title.trim();
        validate_non_empty(title, "schedule.items[].title").map_err(PlannerError::Validation)?;
        let mut schedule = self.require_schedule(schedule_id).await?;
        schedule.items.push(ScheduleItem {
            id: next_id("itm"),
            title: title.to_string(),
            completed: false,
        });
        schedule.status = schedule.derived_status();
        self.schedules.update_schedule(schedule).await
    }

    pub async fn remove_item(
        &self,
        schedule_id: &str,
        item_id: &str,
    ) -> Result<Schedule, PlannerError> {
        let mut schedule = self.require_schedule(schedule_id).await?;
        let before = schedule.items.len();
        schedule.items.retain(|item| item.id != item_id);
        if schedule.items.len() == before {
            return Err(PlannerError::NotFound(format!("schedule item {item_id}")));
        }
        schedule.status = schedule.derived_status();
        self.schedules.update_schedule(schedule).await
    }

    pub async fn retitle_item(
        &self,
        schedule_id: &str,
        item_id: &str,
        title: &str,
    ) -> Result<Schedule, PlannerError> {
        let title = title.trim();
        validate_non_empty(title, "schedule.items[].title").map_err(PlannerError::Validation)?;
        let mut schedule = self.require_schedule(schedule_id).await?;
        let item = schedule
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| PlannerError::NotFound(format!("schedule item {item_id}")))?;
        item.title = title.to_string();
        self.schedules.update_schedule(schedule).await
    }

    /// Flips one checklist item and re-derives the schedule status. When the
    /// schedule is backed by a task, the task follows: completed with the
    /// schedule, back to scheduled when an item is unchecked.
    pub async fn toggle_item(
        &self,
        schedule_id: &str,
        item_id: &str,
    ) -> Result<Schedule, PlannerError> {
        let mut schedule = self.require_schedule(schedule_id).await?;
        let item = schedule
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| PlannerError::NotFound(format!("schedule item {item_id}")))?;
        item.completed = !item.completed;
        schedule.status = schedule.derived_status();
        let updated = self.schedules.update_schedule(schedule).await?;

        if let Some(task_id) = updated.task_id.as_deref() {
            if let Some(mut task) = self.tasks.get_task(task_id).await? {
                let wanted = match updated.status {
                    ScheduleStatus::Completed => TaskStatus::Completed,
                    _ => TaskStatus::Scheduled,
                };
                if task.status != wanted {
                    task.status = wanted;
                    self.tasks.update_task(task).await?;
                }
            }
        }
        Ok(updated)
    }

    /// Places a backlog task on the calendar: inserts the schedule, then
    /// marks the task scheduled. Without an explicit end time the block
    /// spans the task's estimated duration. The second write failing leaves
    /// the schedule in place and surfaces as a warning; the truth stays
    /// recoverable through `is_task_scheduled`.
    pub async fn place_task(
        &self,
        task_id: &str,
        date: NaiveDate,
        start_time: String,
        end_time: Option<String>,
    ) -> Result<PlacementOutcome, PlannerError> {
        let task = self
            .tasks
            .get_task(task_id)
            .await?
            .ok_or_else(|| PlannerError::NotFound(format!("task {task_id}")))?;

        let end_time = match end_time {
            Some(end_time) => end_time,
            None => {
                let span = task.estimated_minutes.unwrap_or(DEFAULT_PLACEMENT_MINUTES);
                add_minutes(&start_time, span).map_err(PlannerError::Validation)?
            }
        };

        let schedule = self
            .create_schedule(ScheduleDraft {
                title: task.title.clone(),
                description: task.description.clone(),
                date,
                start_time,
                end_time,
                color: task.color.clone(),
                items: Vec::new(),
                task_id: Some(task.id.clone()),
            })
            .await?;

        let mut placed = task;
        placed.status = TaskStatus::Scheduled;
        match self.tasks.update_task(placed).await {
            Ok(_) => Ok(PlacementOutcome {
                schedule,
                task_status_updated: true,
                warning: None,
            }),
            Err(error) => Ok(PlacementOutcome {
                schedule,
                task_status_updated: false,
                warning: Some(format!(
                    "schedule created but task {task_id} status update failed: {error}"
                )),
            }),
        }
    }

    /// A task counts as scheduled when any schedule references it,
    /// regardless of what its status field says.
    pub async fn is_task_scheduled(&self, task_id: &str) -> Result<bool, PlannerError> {
        Ok(self
            .schedules
            .list_schedules()
            .await?
            .iter()
            .any(|schedule| schedule.task_id.as_deref() == Some(task_id)))
    }

    /// Marks planned schedules whose operating day has passed as completed.
    /// Running it again at the same instant changes nothing.
    pub async fn reconcile_overdue(&self) -> Result<ReconcileReport, PlannerError> {
        let now = (self.now_provider)();
        let mut today = now.date_naive();
        let now_hhmm = format!("{:02}:{:02}", now.hour(), now.minute());
        // Small hours still belong to the previous operating day.
        if now.hour() < TIMELINE_WINDOW.start_hour {
            today -= Duration::days(1);
        }
        let now_minute = TIMELINE_WINDOW
            .day_minute(&now_hhmm)
            .map_err(PlannerError::Validation)?;

        let mut report = ReconcileReport::default();
        for mut schedule in self.schedules.list_schedules().await? {
            if !matches!(
                schedule.status,
                ScheduleStatus::Planned | ScheduleStatus::Rescheduled
            ) {
                continue;
            }
            let overdue = if schedule.date < today {
                true
            } else if schedule.date == today {
                TIMELINE_WINDOW
                    .day_minute(&schedule.end_time)
                    .map_err(PlannerError::Validation)?
                    <= now_minute
            } else {
                false
            };
            if !overdue {
                continue;
            }
            schedule.status = ScheduleStatus::Completed;
            for item in &mut schedule.items {
                item.completed = true;
            }
            let updated = self.schedules.update_schedule(schedule).await?;
            report.completed_schedule_ids.push(updated.id);
        }
        Ok(report)
    }

    async fn require_schedule(&self, schedule_id: &str) -> Result<Schedule, PlannerError> {
        self.schedules
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| PlannerError::NotFound(format!("schedule {schedule_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Routine, Task};
    use crate::infrastructure::repository::InMemoryPlannerStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn service_at(
        store: Arc<InMemoryPlannerStore>,
        now: &str,
    ) -> ScheduleService<InMemoryPlannerStore, InMemoryPlannerStore, InMemoryPlannerStore> {
        let instant = fixed_time(now);
        ScheduleService::new(store.clone(), store.clone(), store)
            .with_now_provider(Arc::new(move || instant))
    }

    fn sample_draft(title: &str, day: &str) -> ScheduleDraft {
        ScheduleDraft {
            title: title.to_string(),
            description: None,
            date: date(day),
            start_time: "09:00".to_string(),
            end_time: "10:00".to_string(),
            color: None,
            items: vec!["정리".to_string()],
            task_id: None,
        }
    }

    fn sample_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: "독서".to_string(),
            description: None,
            estimated_minutes: Some(60),
            status: TaskStatus::Backlog,
            recurrence: None,
            week_id: "2026-W06".to_string(),
            color: None,
            category: None,
            target_count: None,
            created_at: fixed_time("2026-02-02T08:00:00Z"),
        }
    }

    fn sample_routine(id: &str) -> Routine {
        Routine {
            id: id.to_string(),
            title: "아침 운동".to_string(),
            description: None,
            days: vec![0, 1, 2, 3, 4, 5, 6],
            start_time: "06:00".to_string(),
            end_time: "07:00".to_string(),
            color: None,
            items: Vec::new(),
            is_active: true,
            auto_schedule: true,
            start_date: date("2026-02-01"),
            end_date: None,
            created_at: fixed_time("2026-01-31T12:00:00Z"),
        }
    }

    async fn routine_schedule(
        store: &InMemoryPlannerStore,
        id: &str,
        routine_id: &str,
        day: &str,
    ) -> Schedule {
        let schedule = Schedule {
            id: id.to_string(),
            title: "아침 운동".to_string(),
            description: None,
            date: date(day),
            start_time: "06:00".to_string(),
            end_time: "07:00".to_string(),
            color: None,
            status: ScheduleStatus::Planned,
            items: Vec::new(),
            task_id: None,
            routine_id: Some(routine_id.to_string()),
            google_event_id: None,
            original_date: None,
            original_start_time: None,
            original_end_time: None,
            modified_at: None,
            reschedule_reason: None,
            created_at: fixed_time("2026-02-03T05:00:00Z"),
        };
        store
            .insert_schedule(schedule)
            .await
            .expect("insert schedule")
    }

    #[tokio::test]
    async fn create_schedule_validates_and_trims() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service_at(store.clone(), "2026-02-03T08:00:00Z");

        let created = service
            .create_schedule(ScheduleDraft {
                title: "  회의 준비  ".to_string(),
                items: vec!["자료  ".to_string(), "   ".to_string()],
                ..sample_draft("ignored", "2026-02-03")
            })
            .await
            .expect("create");
        assert_eq!(created.title, "회의 준비");
        assert_eq!(created.items.len(), 1);
        assert_eq!(created.items[0].title, "자료");

        let blank = service
            .create_schedule(ScheduleDraft {
                title: "   ".to_string(),
                ..sample_draft("x", "2026-02-03")
            })
            .await;
        assert!(matches!(blank, Err(PlannerError::Validation(_))));

        let bad_time = service
            .create_schedule(ScheduleDraft {
                start_time: "9:00".to_string(),
                ..sample_draft("회의", "2026-02-03")
            })
            .await;
        assert!(matches!(bad_time, Err(PlannerError::Validation(_))));
    }

    #[tokio::test]
    async fn toggling_items_drives_schedule_and_task_status() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service_at(store.clone(), "2026-02-03T08:00:00Z");
        store
            .insert_task(sample_task("tsk-1"))
            .await
            .expect("insert task");

        let schedule = service
            .create_schedule(ScheduleDraft {
                items: vec!["1장".to_string(), "2장".to_string()],
                task_id: Some("tsk-1".to_string()),
                ..sample_draft("독서", "2026-02-03")
            })
            .await
            .expect("create");
        let first = schedule.items[0].id.clone();
        let second = schedule.items[1].id.clone();

        let after_one = service
            .toggle_item(&schedule.id, &first)
            .await
            .expect("toggle");
        assert_eq!(after_one.status, ScheduleStatus::Planned);

        let after_two = service
            .toggle_item(&schedule.id, &second)
            .await
            .expect("toggle");
        assert_eq!(after_two.status, ScheduleStatus::Completed);
        let task = store.get_task("tsk-1").await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Completed);

        let reopened = service
            .toggle_item(&schedule.id, &second)
            .await
            .expect("toggle back");
        assert_eq!(reopened.status, ScheduleStatus::Planned);
        let task = store.get_task("tsk-1").await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Scheduled);
    }

    #[tokio::test]
    async fn all_future_edit_pushes_changes_to_the_routine() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service_at(store.clone(), "2026-02-03T08:00:00Z");
        store
            .insert_routine(sample_routine("rtn-1"))
            .await
            .expect("insert routine");
        routine_schedule(&store, "sch-1", "rtn-1", "2026-02-03").await;

        let changes = ScheduleChanges {
            title: Some("새벽 운동".to_string()),
            start_time: Some("05:30".to_string()),
            end_time: Some("06:30".to_string()),
            ..ScheduleChanges::default()
        };

        service
            .update_schedule("sch-1", changes.clone(), EditScope::TodayOnly)
            .await
            .expect("today-only edit");
        let routine = store
            .get_routine("rtn-1")
            .await
            .expect("get")
            .expect("routine");
        assert_eq!(routine.title, "아침 운동");

        service
            .update_schedule("sch-1", changes, EditScope::AllFuture)
            .await
            .expect("all-future edit");
        let routine = store
            .get_routine("rtn-1")
            .await
            .expect("get")
            .expect("routine");
        assert_eq!(routine.title, "새벽 운동");
        assert_eq!(routine.start_time, "05:30");
        assert_eq!(routine.end_time, "06:30");
    }

    #[tokio::test]
    async fn all_future_delete_truncates_the_routine() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service_at(store.clone(), "2026-02-04T08:00:00Z");
        store
            .insert_routine(sample_routine("rtn-1"))
            .await
            .expect("insert routine");
        routine_schedule(&store, "sch-past", "rtn-1", "2026-02-03").await;
        routine_schedule(&store, "sch-today", "rtn-1", "2026-02-04").await;
        routine_schedule(&store, "sch-future", "rtn-1", "2026-02-05").await;

        service
            .delete_schedule("sch-today", EditScope::AllFuture)
            .await
            .expect("delete all future");

        let routine = store
            .get_routine("rtn-1")
            .await
            .expect("get")
            .expect("routine");
        assert_eq!(routine.end_date, Some(date("2026-02-03")));

        let remaining = store.list_schedules().await.expect("list");
        let ids: Vec<&str> = remaining.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["sch-past"]);
    }

    #[tokio::test]
    async fn today_only_delete_keeps_the_routine_intact() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service_at(store.clone(), "2026-02-04T08:00:00Z");
        store
            .insert_routine(sample_routine("rtn-1"))
            .await
            .expect("insert routine");
        routine_schedule(&store, "sch-today", "rtn-1", "2026-02-04").await;
        routine_schedule(&store, "sch-future", "rtn-1", "2026-02-05").await;

        service
            .delete_schedule("sch-today", EditScope::TodayOnly)
            .await
            .expect("delete today only");

        let routine = store
            .get_routine("rtn-1")
            .await
            .expect("get")
            .expect("routine");
        assert_eq!(routine.end_date, None);
        let remaining = store.list_schedules().await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "sch-future");
    }

    #[tokio::test]
    async fn reschedule_records_originals_once() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service_at(store.clone(), "2026-02-03T12:00:00Z");
        let schedule = service
            .create_schedule(sample_draft("회의", "2026-02-03"))
            .await
            .expect("create");

        let moved = service
            .reschedule(
                &schedule.id,
                date("2026-02-04"),
                "14:00".to_string(),
                "15:00".to_string(),
                Some("회의실 변경".to_string()),
            )
            .await
            .expect("first move");
        assert_eq!(moved.status, ScheduleStatus::Rescheduled);
        assert_eq!(moved.original_date, Some(date("2026-02-03")));
        assert_eq!(moved.original_start_time.as_deref(), Some("09:00"));
        assert_eq!(moved.modified_at, Some(fixed_time("2026-02-03T12:00:00Z")));
        assert_eq!(moved.reschedule_reason.as_deref(), Some("회의실 변경"));

        let moved_again = service
            .reschedule(
                &schedule.id,
                date("2026-02-05"),
                "16:00".to_string(),
                "17:00".to_string(),
                None,
            )
            .await
            .expect("second move");
        // The earliest coordinates stay on record.
        assert_eq!(moved_again.original_date, Some(date("2026-02-03")));
        assert_eq!(moved_again.original_start_time.as_deref(), Some("09:00"));
        assert_eq!(moved_again.reschedule_reason, None);
    }

    #[tokio::test]
    async fn reconcile_overdue_is_idempotent() {
        let store = Arc::new(InMemoryPlannerStore::new());
        // Now is 2026-02-04 12:00 in operating-day terms.
        let service = service_at(store.clone(), "2026-02-04T12:00:00Z");

        service
            .create_schedule(sample_draft("지난 일정", "2026-02-03"))
            .await
            .expect("past");
        service
            .create_schedule(ScheduleDraft {
                start_time: "08:00".to_string(),
                end_time: "09:00".to_string(),
                ..sample_draft("오늘 아침", "2026-02-04")
            })
            .await
            .expect("earlier today");
        service
            .create_schedule(ScheduleDraft {
                start_time: "20:00".to_string(),
                end_time: "21:00".to_string(),
                ..sample_draft("오늘 저녁", "2026-02-04")
            })
            .await
            .expect("later today");
        service
            .create_schedule(sample_draft("내일 일정", "2026-02-05"))
            .await
            .expect("future");

        let first = service.reconcile_overdue().await.expect("first sweep");
        assert_eq!(first.completed_schedule_ids.len(), 2);

        let second = service.reconcile_overdue().await.expect("second sweep");
        assert!(second.completed_schedule_ids.is_empty());

        let completed: usize = store
            .list_schedules()
            .await
            .expect("list")
            .iter()
            .filter(|schedule| schedule.status == ScheduleStatus::Completed)
            .count();
        assert_eq!(completed, 2);
    }

    #[tokio::test]
    async fn reconcile_in_small_hours_spares_the_running_day() {
        let store = Arc::new(InMemoryPlannerStore::new());
        // 02:00 on Feb 5 still belongs to the Feb 4 operating day.
        let service = service_at(store.clone(), "2026-02-05T02:00:00Z");
        service
            .create_schedule(ScheduleDraft {
                start_time: "23:00".to_string(),
                end_time: "23:30".to_string(),
                ..sample_draft("밤 일정", "2026-02-04")
            })
            .await
            .expect("late evening");
        service
            .create_schedule(ScheduleDraft {
                start_time: "02:30".to_string(),
                end_time: "03:00".to_string(),
                ..sample_draft("심야 일정", "2026-02-04")
            })
            .await
            .expect("small hours");

        let report = service.reconcile_overdue().await.expect("sweep");
        // 23:00-23:30 has passed; 02:30-03:00 has not.
        assert_eq!(report.completed_schedule_ids.len(), 1);
    }

    /// Task store that fails status updates, for the two-step placement
    /// warning path.
    struct ReadOnlyTaskStore {
        inner: Arc<InMemoryPlannerStore>,
    }

    #[async_trait]
    impl TaskRepository for ReadOnlyTaskStore {
        async fn list_tasks(&self) -> Result<Vec<Task>, PlannerError> {
            self.inner.list_tasks().await
        }

        async fn get_task(&self, id: &str) -> Result<Option<Task>, PlannerError> {
            self.inner.get_task(id).await
        }

        async fn insert_task(&self, task: Task) -> Result<Task, PlannerError> {
            self.inner.insert_task(task).await
        }

        async fn update_task(&self, _task: Task) -> Result<Task, PlannerError> {
            Err(PlannerError::Provider("update rejected".to_string()))
        }

        async fn delete_task(&self, id: &str) -> Result<(), PlannerError> {
            self.inner.delete_task(id).await
        }
    }

    #[tokio::test]
    async fn placement_survives_a_failed_task_status_update() {
        let store = Arc::new(InMemoryPlannerStore::new());
        store
            .insert_task(sample_task("tsk-1"))
            .await
            .expect("insert task");
        let tasks = Arc::new(ReadOnlyTaskStore {
            inner: store.clone(),
        });
        let service = ScheduleService::new(store.clone(), store.clone(), tasks);

        let outcome = service
            .place_task(
                "tsk-1",
                date("2026-02-03"),
                "09:00".to_string(),
                Some("10:00".to_string()),
            )
            .await
            .expect("placement");
        assert!(!outcome.task_status_updated);
        assert!(outcome.warning.is_some());
        assert_eq!(outcome.schedule.task_id.as_deref(), Some("tsk-1"));

        // The task row still says backlog, but the referencing schedule is
        // what decides.
        let task = store.get_task("tsk-1").await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Backlog);
        assert!(service.is_task_scheduled("tsk-1").await.expect("derived"));
    }

    #[tokio::test]
    async fn deleting_the_last_schedule_returns_the_task_to_backlog() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service_at(store.clone(), "2026-02-03T08:00:00Z");
        store
            .insert_task(sample_task("tsk-1"))
            .await
            .expect("insert task");

        let outcome = service
            .place_task("tsk-1", date("2026-02-03"), "09:00".to_string(), None)
            .await
            .expect("placement");
        assert!(outcome.task_status_updated);
        // End time comes from the 60 minute estimate.
        assert_eq!(outcome.schedule.end_time, "10:00");
        let task = store.get_task("tsk-1").await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Scheduled);

        service
            .delete_schedule(&outcome.schedule.id, EditScope::TodayOnly)
            .await
            .expect("delete");
        let task = store.get_task("tsk-1").await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Backlog);
        assert!(!service.is_task_scheduled("tsk-1").await.expect("derived"));
    }

    #[tokio::test]
    async fn item_crud_keeps_status_in_step() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service_at(store.clone(), "2026-02-03T08:00:00Z");
        let schedule = service
            .create_schedule(ScheduleDraft {
                items: vec!["1장".to_string()],
                ..sample_draft("독서", "2026-02-03")
            })
            .await
            .expect("create");
        let item_id = schedule.items[0].id.clone();

        let completed = service
            .toggle_item(&schedule.id, &item_id)
            .await
            .expect("toggle");
        assert_eq!(completed.status, ScheduleStatus::Completed);

        // Adding an open item reopens the schedule.
        let with_new = service
            .add_item(&schedule.id, "2장")
            .await
            .expect("add item");
        assert_eq!(with_new.status, ScheduleStatus::Planned);
        assert_eq!(with_new.items.len(), 2);

        let renamed = service
            .retitle_item(&schedule.id, &with_new.items[1].id, "2장 복습")
            .await
            .expect("retitle");
        assert_eq!(renamed.items[1].title, "2장 복습");

        let back = service
            .remove_item(&schedule.id, &renamed.items[1].id)
            .await
            .expect("remove");
        assert_eq!(back.status, ScheduleStatus::Completed);
        assert_eq!(back.items.len(), 1);
    }
}
