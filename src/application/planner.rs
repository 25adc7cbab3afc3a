use crate::application::calendar_feed_service::{CalendarFeedService, FeedResult};
use crate::application::day_planner::{DayPlanner, DayView};
use crate::application::routine_engine::{MaterializeReport, RoutineEngine};
use crate::application::schedule_service::{
    EditScope, PlacementOutcome, ReconcileReport, ScheduleChanges, ScheduleDraft, ScheduleService,
};
use crate::application::weekly_goals::{ExpansionReport, WeeklyGoalService};
use crate::application::NowProvider;
use crate::domain::models::{Schedule, Task, Week, WeeklyGoal};
use crate::infrastructure::calendar_feed::{CalendarFeedClient, FeedCalendar};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::repository::{
    RoutineRepository, ScheduleRepository, TaskRepository, WeekRepository,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Application facade: wires the services over one backing store and one
/// calendar feed, and keeps a JSON-lines operation log. Logging is
/// best-effort and never fails an operation.
pub struct PlannerState<P, C>
where
    P: TaskRepository + ScheduleRepository + RoutineRepository + WeekRepository + 'static,
    C: CalendarFeedClient + 'static,
{
    logs_dir: PathBuf,
    routine_engine: RoutineEngine<P, P>,
    day_planner: DayPlanner<P, P>,
    schedule_service: ScheduleService<P, P, P>,
    weekly_goals: WeeklyGoalService<P, P, P>,
    calendar_feed: CalendarFeedService<C>,
    feed_calendars: Vec<FeedCalendar>,
    log_guard: Mutex<()>,
}

impl<P, C> PlannerState<P, C>
where
    P: TaskRepository + ScheduleRepository + RoutineRepository + WeekRepository + 'static,
    C: CalendarFeedClient + 'static,
{
    pub fn new(store: Arc<P>, feed_client: Arc<C>, logs_dir: PathBuf) -> Self {
        Self {
            logs_dir,
            routine_engine: RoutineEngine::new(store.clone(), store.clone()),
            day_planner: DayPlanner::new(store.clone(), store.clone()),
            schedule_service: ScheduleService::new(store.clone(), store.clone(), store.clone()),
            weekly_goals: WeeklyGoalService::new(store.clone(), store.clone(), store),
            calendar_feed: CalendarFeedService::new(feed_client),
            feed_calendars: vec![FeedCalendar {
                id: "primary".to_string(),
                color: None,
            }],
            log_guard: Mutex::new(()),
        }
    }

    pub fn with_feed_calendars(mut self, calendars: Vec<FeedCalendar>) -> Self {
        self.feed_calendars = calendars;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.routine_engine = self.routine_engine.with_now_provider(now_provider.clone());
        self.schedule_service = self
            .schedule_service
            .with_now_provider(now_provider.clone());
        self.weekly_goals = self.weekly_goals.with_now_provider(now_provider);
        self
    }

    /// Loads one day: sweeps overdue schedules, materializes due routines,
    /// pulls the calendar feed, and merges everything into the day view.
    /// Feed trouble degrades to a view without external events.
    pub async fn load_day_impl(
        &self,
        date: NaiveDate,
        access_token: Option<&str>,
    ) -> Result<DayView, PlannerError> {
        let swept = self.schedule_service.reconcile_overdue().await?;
        if !swept.completed_schedule_ids.is_empty() {
            self.log_info(
                "load_day",
                &format!(
                    "auto-completed {} overdue schedule(s)",
                    swept.completed_schedule_ids.len()
                ),
            );
        }

        let report = self.routine_engine.materialize_for_date(date).await?;
        self.log_materialization(&report);

        let feed = self.fetch_feed(date, access_token).await?;
        if let Some(advisory) = feed.advisory.as_deref() {
            self.log_info("load_day", advisory);
        }

        self.day_planner.view_for(date, &feed.events).await
    }

    pub async fn materialize_for_date_impl(
        &self,
        date: NaiveDate,
    ) -> Result<MaterializeReport, PlannerError> {
        let report = self.routine_engine.materialize_for_date(date).await?;
        self.log_materialization(&report);
        Ok(report)
    }

    pub async fn materialize_routine_impl(
        &self,
        routine_id: &str,
        date: NaiveDate,
    ) -> Result<Schedule, PlannerError> {
        let schedule = self
            .routine_engine
            .materialize_routine(routine_id, date)
            .await?;
        self.log_info(
            "materialize_routine",
            &format!("routine {routine_id} materialized as {}", schedule.id),
        );
        Ok(schedule)
    }

    pub async fn create_schedule_impl(
        &self,
        draft: ScheduleDraft,
    ) -> Result<Schedule, PlannerError> {
        let schedule = self.schedule_service.create_schedule(draft).await?;
        self.log_info("create_schedule", &format!("created {}", schedule.id));
        Ok(schedule)
    }

    pub async fn update_schedule_impl(
        &self,
        schedule_id: &str,
        changes: ScheduleChanges,
        scope: EditScope,
    ) -> Result<Schedule, PlannerError> {
        let schedule = self
            .schedule_service
            .update_schedule(schedule_id, changes, scope)
            .await?;
        self.log_info("update_schedule", &format!("updated {schedule_id}"));
        Ok(schedule)
    }

    pub async fn delete_schedule_impl(
        &self,
        schedule_id: &str,
        scope: EditScope,
    ) -> Result<(), PlannerError> {
        self.schedule_service
            .delete_schedule(schedule_id, scope)
            .await?;
        self.log_info("delete_schedule", &format!("deleted {schedule_id}"));
        Ok(())
    }

    pub async fn reschedule_impl(
        &self,
        schedule_id: &str,
        new_date: NaiveDate,
        new_start: String,
        new_end: String,
        reason: Option<String>,
    ) -> Result<Schedule, PlannerError> {
        let schedule = self
            .schedule_service
            .reschedule(schedule_id, new_date, new_start, new_end, reason)
            .await?;
        self.log_info(
            "reschedule",
            &format!("moved {schedule_id} to {new_date}"),
        );
        Ok(schedule)
    }

    pub async fn toggle_item_impl(
        &self,
        schedule_id: &str,
        item_id: &str,
    ) -> Result<Schedule, PlannerError> {
        self.schedule_service.toggle_item(schedule_id, item_id).await
    }

    pub async fn place_task_impl(
        &self,
        task_id: &str,
        date: NaiveDate,
        start_time: String,
        end_time: Option<String>,
    ) -> Result<PlacementOutcome, PlannerError> {
        let outcome = self
            .schedule_service
            .place_task(task_id, date, start_time, end_time)
            .await?;
        match outcome.warning.as_deref() {
            Some(warning) => self.log_error("place_task", warning),
            None => self.log_info(
                "place_task",
                &format!("task {task_id} placed as {}", outcome.schedule.id),
            ),
        }
        Ok(outcome)
    }

    pub async fn reconcile_overdue_impl(&self) -> Result<ReconcileReport, PlannerError> {
        self.schedule_service.reconcile_overdue().await
    }

    pub async fn week_for_impl(&self, date: NaiveDate) -> Result<Week, PlannerError> {
        self.weekly_goals.week_for(date).await
    }

    pub async fn add_goal_impl(
        &self,
        week_id: &str,
        goal: WeeklyGoal,
    ) -> Result<Week, PlannerError> {
        self.weekly_goals.add_goal(week_id, goal).await
    }

    pub async fn expand_goals_impl(&self, week_id: &str) -> Result<ExpansionReport, PlannerError> {
        let report = self.weekly_goals.expand_goals_to_backlog(week_id).await?;
        self.log_info(
            "expand_goals",
            &format!(
                "week {week_id}: created {} task(s), {} already present",
                report.created.len(),
                report.skipped_existing
            ),
        );
        Ok(report)
    }

    pub async fn remaining_count_impl(&self, task: &Task) -> Result<u32, PlannerError> {
        self.weekly_goals.remaining_count(task).await
    }

    pub fn command_error(&self, command: &str, error: &PlannerError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    async fn fetch_feed(
        &self,
        date: NaiveDate,
        access_token: Option<&str>,
    ) -> Result<FeedResult, PlannerError> {
        // The operating day spills past midnight, so fetch into the next
        // calendar day and let the view filter by date.
        let time_min = day_start_utc(date);
        let time_max = time_min + Duration::days(2);
        self.calendar_feed
            .fetch_events(access_token, &self.feed_calendars, time_min, time_max)
            .await
    }

    fn log_materialization(&self, report: &MaterializeReport) {
        if !report.created.is_empty() || !report.failed.is_empty() {
            self.log_info(
                "materialize",
                &format!(
                    "created {}, skipped {}, failed {}",
                    report.created.len(),
                    report.skipped_existing,
                    report.failed.len()
                ),
            );
        }
        for failure in &report.failed {
            self.log_error(
                "materialize",
                &format!("routine {}: {}", failure.routine_id, failure.message),
            );
        }
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("operations.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

fn day_start_utc(date: NaiveDate) -> DateTime<Utc> {
    match date.and_hms_opt(0, 0, 0) {
        Some(start) => Utc.from_utc_datetime(&start),
        None => Utc::now(),
    }
}
