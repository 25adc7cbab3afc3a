use crate::domain::time::{duration_minutes, validate_hhmm};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COLOR: &str = "#8B7CF6";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

/// Recurrence descriptor on a backlog task. Weekly day sets use the same
/// 0 = Sunday through 6 = Saturday encoding as routines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRecurrence {
    Daily,
    Weekly { days: Vec<u8> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub estimated_minutes: Option<u32>,
    pub status: TaskStatus,
    #[serde(default)]
    pub recurrence: Option<TaskRecurrence>,
    pub week_id: String,
    pub color: Option<String>,
    pub category: Option<String>,
    pub target_count: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.title, "task.title")?;
        validate_non_empty(&self.week_id, "task.week_id")?;
        if self.target_count == Some(0) {
            return Err("task.target_count must be > 0".to_string());
        }
        if let Some(TaskRecurrence::Weekly { days }) = &self.recurrence {
            if days.is_empty() {
                return Err("task.recurrence.days must not be empty".to_string());
            }
            if days.iter().any(|day| *day > 6) {
                return Err("task.recurrence.days[] must be 0..=6".to_string());
            }
        }
        Ok(())
    }

    /// Base title and repetition target. The title's legacy `"(<N>회)"`
    /// suffix is always stripped for the base; the structured field wins
    /// over the suffix for the count.
    pub fn repeat_target(&self) -> (String, u32) {
        let (base, parsed) = parse_repeat_title(&self.title);
        (base, self.target_count.unwrap_or(parsed))
    }
}

/// Splits a legacy `"<title> (<N>회)"` title into base title and count.
/// Titles without the suffix count as a single repetition.
pub fn parse_repeat_title(title: &str) -> (String, u32) {
    let trimmed = title.trim();
    if let Some(rest) = trimmed.strip_suffix("회)") {
        if let Some(open) = rest.rfind('(') {
            let digits = &rest[open + 1..];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(count) = digits.parse::<u32>() {
                    if count > 0 {
                        return (rest[..open].trim_end().to_string(), count);
                    }
                }
            }
        }
    }
    (trimmed.to_string(), 1)
}

/// Formats a backlog title for a repeated goal: the bare title when the
/// target is 1, otherwise the `"<title> (<N>회)"` form.
pub fn format_repeat_title(title: &str, target_count: u32) -> String {
    if target_count > 1 {
        format!("{title} ({target_count}회)")
    } else {
        title.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleItem {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Planned,
    Completed,
    Partial,
    Skipped,
    Rescheduled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub color: Option<String>,
    pub status: ScheduleStatus,
    pub items: Vec<ScheduleItem>,
    pub task_id: Option<String>,
    pub routine_id: Option<String>,
    pub google_event_id: Option<String>,
    pub original_date: Option<NaiveDate>,
    pub original_start_time: Option<String>,
    pub original_end_time: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub reschedule_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "schedule.id")?;
        validate_non_empty(&self.title, "schedule.title")?;
        validate_hhmm(&self.start_time, "schedule.start_time")?;
        validate_hhmm(&self.end_time, "schedule.end_time")?;
        for item in &self.items {
            validate_non_empty(&item.id, "schedule.items[].id")?;
            validate_non_empty(&item.title, "schedule.items[].title")?;
        }
        Ok(())
    }

    pub fn duration_minutes(&self) -> Result<u32, String> {
        duration_minutes(&self.start_time, &self.end_time)
    }

    /// Status derived from checklist items: completed when every item is
    /// checked, planned otherwise. Schedules without items keep their
    /// current status.
    pub fn derived_status(&self) -> ScheduleStatus {
        if self.items.is_empty() {
            return self.status.clone();
        }
        if self.items.iter().all(|item| item.completed) {
            ScheduleStatus::Completed
        } else {
            ScheduleStatus::Planned
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Routine {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Active weekdays, 0 = Sunday through 6 = Saturday.
    pub days: Vec<u8>,
    pub start_time: String,
    pub end_time: String,
    pub color: Option<String>,
    pub items: Vec<String>,
    pub is_active: bool,
    pub auto_schedule: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Routine {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "routine.id")?;
        validate_non_empty(&self.title, "routine.title")?;
        validate_hhmm(&self.start_time, "routine.start_time")?;
        validate_hhmm(&self.end_time, "routine.end_time")?;
        if self.days.is_empty() {
            return Err("routine.days must not be empty".to_string());
        }
        if self.days.iter().any(|day| *day > 6) {
            return Err("routine.days[] must be 0..=6".to_string());
        }
        if let Some(end_date) = self.end_date {
            if end_date < self.start_date {
                return Err("routine.end_date must be >= routine.start_date".to_string());
            }
        }
        Ok(())
    }

    /// Whether the routine produces an occurrence on `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if !self.is_active {
            return false;
        }
        if date < self.start_date {
            return false;
        }
        if let Some(end_date) = self.end_date {
            if date > end_date {
                return false;
            }
        }
        let weekday = date.weekday().num_days_from_sunday() as u8;
        self.days.contains(&weekday)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyGoal {
    pub id: String,
    pub title: String,
    pub target_count: u32,
    pub completed_count: u32,
    pub estimated_minutes: Option<u32>,
    pub category: Option<String>,
}

impl WeeklyGoal {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "goal.id")?;
        validate_non_empty(&self.title, "goal.title")?;
        if self.target_count == 0 {
            return Err("goal.target_count must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Week {
    pub id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Legacy free-form goals kept alongside the structured list.
    pub goals: Vec<String>,
    pub weekly_goals: Vec<WeeklyGoal>,
}

impl Week {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "week.id")?;
        if self.end_date < self.start_date {
            return Err("week.end_date must be >= week.start_date".to_string());
        }
        for goal in &self.weekly_goals {
            goal.validate()?;
        }
        Ok(())
    }
}

/// Event pulled from an external calendar feed, read-only on our side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalEvent {
    pub id: String,
    pub calendar_id: String,
    pub title: String,
    /// RFC 3339 instant, or a bare date for all-day events.
    pub start: String,
    pub end: String,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub color: Option<String>,
    pub html_link: Option<String>,
}

impl ExternalEvent {
    /// Calendar-day containment: the event shows on every day from its
    /// start date through its end date, so multi-day and overnight events
    /// stay visible past their first day.
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        let Some(start) = instant_date(&self.start) else {
            return false;
        };
        let end = instant_date(&self.end).unwrap_or(start);
        start <= date && date <= end
    }

    /// `HH:MM` portion of the start instant; all-day events start the day.
    pub fn start_hhmm(&self) -> String {
        hhmm_of_instant(&self.start)
    }

    pub fn end_hhmm(&self) -> String {
        hhmm_of_instant(&self.end)
    }
}

fn hhmm_of_instant(value: &str) -> String {
    value
        .get(11..16)
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "00:00".to_string())
}

fn instant_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d").ok()
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
