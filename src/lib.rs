pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::calendar_feed_service::{CalendarFeedService, FeedResult, RetryPolicy};
pub use application::day_planner::{DayPlanner, DayView, SlotCell, TimelineEntry};
pub use application::planner::PlannerState;
pub use application::routine_engine::{MaterializeReport, RoutineEngine};
pub use application::schedule_service::{
    EditScope, PlacementOutcome, ReconcileReport, ScheduleChanges, ScheduleDraft, ScheduleService,
};
pub use application::weekly_goals::{ExpansionReport, WeeklyGoalService};
pub use domain::models::{
    ExternalEvent, Routine, Schedule, ScheduleItem, ScheduleStatus, Task, TaskRecurrence,
    TaskStatus, Week, WeeklyGoal,
};
pub use domain::occurrence::Occurrence;
pub use domain::time::{DayWindow, SLOT_GRID_WINDOW, TIMELINE_WINDOW};
pub use infrastructure::calendar_feed::{
    CalendarFeedClient, FeedCalendar, ReqwestCalendarFeedClient,
};
pub use infrastructure::error::PlannerError;
pub use infrastructure::provider_client::RestProviderClient;
pub use infrastructure::repository::{
    InMemoryPlannerStore, RoutineRepository, ScheduleRepository, TaskRepository, WeekRepository,
};
