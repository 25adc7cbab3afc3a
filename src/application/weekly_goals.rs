use crate::application::{next_id, NowProvider};
use crate::domain::models::{
    format_repeat_title, parse_repeat_title, validate_non_empty, Task, TaskStatus, Week,
    WeeklyGoal,
};
use crate::domain::time::{week_end, week_id_for, week_start};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::repository::{ScheduleRepository, TaskRepository, WeekRepository};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ExpansionReport {
    pub created: Vec<Task>,
    pub skipped_existing: usize,
}

pub struct WeeklyGoalService<W, T, S>
where
    W: WeekRepository,
    T: TaskRepository,
    S: ScheduleRepository,
{
    weeks: Arc<W>,
    tasks: Arc<T>,
    schedules: Arc<S>,
    now_provider: NowProvider,
}

impl<W, T, S> WeeklyGoalService<W, T, S>
where
    W: WeekRepository,
    T: TaskRepository,
    S: ScheduleRepository,
{
    pub fn new(weeks: Arc<W>, tasks: Arc<T>, schedules: Arc<S>) -> Self {
        Self {
            weeks,
            tasks,
            schedules,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// The ISO week containing `date`, created lazily on first touch.
    pub async fn week_for(&self, date: NaiveDate) -> Result<Week, PlannerError> {
        self.weeks
            .get_or_create_week(&week_id_for(date), week_start(date), week_end(date))
            .await
    }

    pub async fn add_goal(&self, week_id: &str, goal: WeeklyGoal) -> Result<Week, PlannerError> {
        goal.validate().map_err(PlannerError::Validation)?;
        let mut week = self.require_week(week_id).await?;
        week.weekly_goals.push(goal);
        self.weeks.update_week(week).await
    }

    pub async fn remove_goal(&self, week_id: &str, goal_id: &str) -> Result<Week, PlannerError> {
        let mut week = self.require_week(week_id).await?;
        let before = week.weekly_goals.len();
        week.weekly_goals.retain(|goal| goal.id != goal_id);
        if week.weekly_goals.len() == before {
            return Err(PlannerError::NotFound(format!("weekly goal {goal_id}")));
        }
        self.weeks.update_week(week).await
    }

    /// Turns each weekly goal into one backlog task, titled with the
    /// repetition suffix when the target is more than one. Goals whose task
    /// already exists in the week are skipped, so re-expansion is safe.
    pub async fn expand_goals_to_backlog(
        &self,
        week_id: &str,
    ) -> Result<ExpansionReport, PlannerError> {
        let week = self.require_week(week_id).await?;
        let existing: Vec<String> = self
            .tasks
            .list_tasks()
            .await?
            .into_iter()
            .filter(|task| task.week_id == week.id)
            .map(|task| task.repeat_target().0)
            .collect();

        let mut report = ExpansionReport::default();
        for goal in &week.weekly_goals {
            // Matching is on the base title with any repetition suffix
            // stripped, so a bare "독서" task blocks a "독서 (3회)" duplicate
            // even when the goal's target has changed since.
            let already = existing.iter().any(|base| base == goal.title.trim());
            if already {
                report.skipped_existing += 1;
                continue;
            }
            let task = Task {
                id: next_id("tsk"),
                title: format_repeat_title(goal.title.trim(), goal.target_count),
                description: None,
                estimated_minutes: goal.estimated_minutes,
                status: TaskStatus::Backlog,
                recurrence: None,
                week_id: week.id.clone(),
                color: None,
                category: goal.category.clone(),
                target_count: Some(goal.target_count),
                created_at: (self.now_provider)(),
            };
            report.created.push(self.tasks.insert_task(task).await?);
        }
        Ok(report)
    }

    /// Repetitions of `task` still unplaced this week. Consumption counts
    /// checklist items across every schedule in the task's week whose title
    /// matches the goal's base title.
    pub async fn remaining_count(&self, task: &Task) -> Result<u32, PlannerError> {
        validate_non_empty(&task.week_id, "task.week_id").map_err(PlannerError::Validation)?;
        let week = self.require_week(&task.week_id).await?;
        let (base_title, target) = task.repeat_target();

        let consumed = self
            .schedules
            .list_schedules_between(week.start_date, week.end_date)
            .await?
            .iter()
            .flat_map(|schedule| schedule.items.iter())
            .filter(|item| {
                let (item_base, _) = parse_repeat_title(&item.title);
                item_base == base_title
            })
            .count() as u32;

        Ok(target.saturating_sub(consumed))
    }

    async fn require_week(&self, week_id: &str) -> Result<Week, PlannerError> {
        self.weeks
            .get_week(week_id)
            .await?
            .ok_or_else(|| PlannerError::NotFound(format!("week {week_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Schedule, ScheduleItem, ScheduleStatus};
    use crate::infrastructure::repository::InMemoryPlannerStore;
    use chrono::{DateTime, Utc};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn service(
        store: Arc<InMemoryPlannerStore>,
    ) -> WeeklyGoalService<InMemoryPlannerStore, InMemoryPlannerStore, InMemoryPlannerStore> {
        WeeklyGoalService::new(store.clone(), store.clone(), store)
            .with_now_provider(Arc::new(|| fixed_time("2026-02-02T08:00:00Z")))
    }

    fn reading_goal(target_count: u32) -> WeeklyGoal {
        WeeklyGoal {
            id: next_id("gol"),
            title: "독서".to_string(),
            target_count,
            completed_count: 0,
            estimated_minutes: Some(60),
            category: None,
        }
    }

    async fn schedule_with_item(store: &InMemoryPlannerStore, id: &str, day: &str, item: &str) {
        let schedule = Schedule {
            id: id.to_string(),
            title: "저녁 계획".to_string(),
            description: None,
            date: date(day),
            start_time: "20:00".to_string(),
            end_time: "21:00".to_string(),
            color: None,
            status: ScheduleStatus::Planned,
            items: vec![ScheduleItem {
                id: next_id("itm"),
                title: item.to_string(),
                completed: false,
            }],
            task_id: None,
            routine_id: None,
            google_event_id: None,
            original_date: None,
            original_start_time: None,
            original_end_time: None,
            modified_at: None,
            reschedule_reason: None,
            created_at: fixed_time("2026-02-02T08:00:00Z"),
        };
        store.insert_schedule(schedule).await.expect("insert schedule");
    }

    #[tokio::test]
    async fn week_for_creates_monday_to_sunday_weeks() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service(store);
        let week = service.week_for(date("2026-02-04")).await.expect("week");
        assert_eq!(week.id, "2026-W06");
        assert_eq!(week.start_date, date("2026-02-02"));
        assert_eq!(week.end_date, date("2026-02-08"));
    }

    #[tokio::test]
    async fn expansion_titles_carry_the_repeat_suffix() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service(store.clone());
        let week = service.week_for(date("2026-02-02")).await.expect("week");
        service
            .add_goal(&week.id, reading_goal(3))
            .await
            .expect("add goal");
        service
            .add_goal(
                &week.id,
                WeeklyGoal {
                    id: next_id("gol"),
                    title: "회고".to_string(),
                    target_count: 1,
                    completed_count: 0,
                    estimated_minutes: None,
                    category: None,
                },
            )
            .await
            .expect("add goal");

        let report = service
            .expand_goals_to_backlog(&week.id)
            .await
            .expect("expand");
        assert_eq!(report.created.len(), 2);
        let titles: Vec<&str> = report
            .created
            .iter()
            .map(|task| task.title.as_str())
            .collect();
        assert!(titles.contains(&"독서 (3회)"));
        assert!(titles.contains(&"회고"));
        assert!(report.created.iter().all(|task| task.target_count.is_some()));

        let again = service
            .expand_goals_to_backlog(&week.id)
            .await
            .expect("re-expand");
        assert!(again.created.is_empty());
        assert_eq!(again.skipped_existing, 2);
    }

    #[tokio::test]
    async fn a_bare_task_with_the_same_base_title_blocks_expansion() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service(store.clone());
        let week = service.week_for(date("2026-02-02")).await.expect("week");
        service
            .add_goal(&week.id, reading_goal(3))
            .await
            .expect("add goal");

        // A task without the suffix, added by hand before expansion.
        store
            .insert_task(Task {
                id: "tsk-manual".to_string(),
                title: "독서".to_string(),
                description: None,
                estimated_minutes: None,
                status: TaskStatus::Backlog,
                recurrence: None,
                week_id: week.id.clone(),
                color: None,
                category: None,
                target_count: None,
                created_at: fixed_time("2026-02-02T07:00:00Z"),
            })
            .await
            .expect("insert task");

        let report = service
            .expand_goals_to_backlog(&week.id)
            .await
            .expect("expand");
        assert!(report.created.is_empty());
        assert_eq!(report.skipped_existing, 1);
    }

    #[tokio::test]
    async fn remaining_counts_matching_items_across_the_week() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service(store.clone());
        service.week_for(date("2026-02-02")).await.expect("week");

        // Legacy row: the target lives in the title suffix only.
        let task = Task {
            id: "tsk-1".to_string(),
            title: "독서 (3회)".to_string(),
            description: None,
            estimated_minutes: None,
            status: TaskStatus::Backlog,
            recurrence: None,
            week_id: "2026-W06".to_string(),
            color: None,
            category: None,
            target_count: None,
            created_at: fixed_time("2026-02-02T08:00:00Z"),
        };
        store.insert_task(task.clone()).await.expect("insert task");

        schedule_with_item(&store, "sch-1", "2026-02-03", "독서").await;
        schedule_with_item(&store, "sch-2", "2026-02-05", "독서").await;
        schedule_with_item(&store, "sch-3", "2026-02-05", "운동").await;
        // Outside the week, so it never counts.
        schedule_with_item(&store, "sch-4", "2026-02-09", "독서").await;

        assert_eq!(service.remaining_count(&task).await.expect("count"), 1);

        // The structured field, when present, wins over the suffix.
        let mut structured = task;
        structured.target_count = Some(5);
        assert_eq!(
            service.remaining_count(&structured).await.expect("count"),
            3
        );
    }

    #[tokio::test]
    async fn remaining_never_goes_negative() {
        let store = Arc::new(InMemoryPlannerStore::new());
        let service = service(store.clone());
        service.week_for(date("2026-02-02")).await.expect("week");
        let task = Task {
            id: "tsk-1".to_string(),
            title: "독서".to_string(),
            description: None,
            estimated_minutes: None,
            status: TaskStatus::Backlog,
            recurrence: None,
            week_id: "2026-W06".to_string(),
            color: None,
            category: None,
            target_count: Some(1),
            created_at: fixed_time("2026-02-02T08:00:00Z"),
        };
        schedule_with_item(&store, "sch-1", "2026-02-03", "독서").await;
        schedule_with_item(&store, "sch-2", "2026-02-04", "독서").await;
        assert_eq!(service.remaining_count(&task).await.expect("count"), 0);
    }
}
