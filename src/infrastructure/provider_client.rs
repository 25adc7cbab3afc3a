use crate::domain::models::{Routine, Schedule, Task, Week};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::repository::{
    RoutineRepository, ScheduleRepository, TaskRepository, WeekRepository,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Mutex;
use url::Url;

const TASKS_TABLE: &str = "tasks";
const SCHEDULES_TABLE: &str = "schedules";
const ROUTINES_TABLE: &str = "routines";
const WEEKS_TABLE: &str = "weeks";

/// REST client for the hosted planner database (PostgREST-style table
/// endpoints, snake_case columns, bearer session auth).
///
/// Reads without a session resolve to empty result sets so an unauthenticated
/// client degrades to an empty planner; mutations without a session fail.
#[derive(Debug)]
pub struct RestProviderClient {
    client: Client,
    base_url: Url,
    api_key: String,
    session_token: Mutex<Option<String>>,
}

impl RestProviderClient {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
            session_token: Mutex::new(None),
        }
    }

    pub fn set_session(&self, token: Option<String>) {
        if let Ok(mut session) = self.session_token.lock() {
            *session = token
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
        }
    }

    fn session(&self) -> Option<String> {
        self.session_token.lock().ok().and_then(|guard| guard.clone())
    }

    fn require_session(&self) -> Result<String, PlannerError> {
        self.session()
            .ok_or_else(|| PlannerError::Provider("no active session".to_string()))
    }

    fn table_endpoint(&self, table: &str) -> Result<Url, PlannerError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                PlannerError::Provider("provider base URL cannot be a base".to_string())
            })?;
            segments.push("rest");
            segments.push("v1");
            segments.push(table);
        }
        Ok(url)
    }

    fn provider_http_error(status: reqwest::StatusCode, body: &str) -> PlannerError {
        let message = if body.trim().is_empty() {
            format!("provider api error: http {}", status.as_u16())
        } else {
            format!("provider api error: http {}; body={body}", status.as_u16())
        };
        PlannerError::Provider(message)
    }

    async fn select_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, PlannerError> {
        let Some(token) = self.session() else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(self.table_endpoint(table)?)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            PlannerError::Provider(format!("failed reading {table} response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::provider_http_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|error| {
            PlannerError::Provider(format!("invalid {table} payload: {error}; body={body}"))
        })
    }

    async fn insert_row<T: Serialize + DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<T, PlannerError> {
        let token = self.require_session()?;
        let response = self
            .client
            .post(self.table_endpoint(table)?)
            .header("apikey", &self.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(token)
            .json(row)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            PlannerError::Provider(format!("failed reading {table} insert response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::provider_http_error(status, &body));
        }
        let mut rows: Vec<T> = serde_json::from_str(&body).map_err(|error| {
            PlannerError::Provider(format!("invalid {table} insert payload: {error}; body={body}"))
        })?;
        if rows.is_empty() {
            return Err(PlannerError::Provider(format!(
                "{table} insert returned no row"
            )));
        }
        Ok(rows.remove(0))
    }

    async fn update_row<T: Serialize + DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
        row: &T,
    ) -> Result<T, PlannerError> {
        let token = self.require_session()?;
        let response = self
            .client
            .patch(self.table_endpoint(table)?)
            .header("apikey", &self.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(token)
            .query(&[("id", format!("eq.{id}"))])
            .json(row)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            PlannerError::Provider(format!("failed reading {table} update response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::provider_http_error(status, &body));
        }
        let mut rows: Vec<T> = serde_json::from_str(&body).map_err(|error| {
            PlannerError::Provider(format!("invalid {table} update payload: {error}; body={body}"))
        })?;
        if rows.is_empty() {
            return Err(PlannerError::NotFound(format!("{table} row {id}")));
        }
        Ok(rows.remove(0))
    }

    async fn delete_row(&self, table: &str, id: &str) -> Result<(), PlannerError> {
        let token = self.require_session()?;
        let response = self
            .client
            .delete(self.table_endpoint(table)?)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            PlannerError::Provider(format!("failed reading {table} delete response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::provider_http_error(status, &body));
        }
        Ok(())
    }
}

fn date_filter(column: &'static str, date: NaiveDate) -> (&'static str, String) {
    (column, format!("eq.{}", date.format("%Y-%m-%d")))
}

#[async_trait]
impl TaskRepository for RestProviderClient {
    async fn list_tasks(&self) -> Result<Vec<Task>, PlannerError> {
        self.select_rows(TASKS_TABLE, &[("order", "created_at.asc".to_string())])
            .await
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, PlannerError> {
        let rows: Vec<Task> = self
            .select_rows(TASKS_TABLE, &[("id", format!("eq.{id}"))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_task(&self, task: Task) -> Result<Task, PlannerError> {
        self.insert_row(TASKS_TABLE, &task).await
    }

    async fn update_task(&self, task: Task) -> Result<Task, PlannerError> {
        self.update_row(TASKS_TABLE, &task.id, &task).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), PlannerError> {
        self.delete_row(TASKS_TABLE, id).await
    }
}

#[async_trait]
impl ScheduleRepository for RestProviderClient {
    async fn list_schedules(&self) -> Result<Vec<Schedule>, PlannerError> {
        self.select_rows(
            SCHEDULES_TABLE,
            &[("order", "date.asc,start_time.asc".to_string())],
        )
        .await
    }

    async fn list_schedules_on(&self, date: NaiveDate) -> Result<Vec<Schedule>, PlannerError> {
        self.select_rows(
            SCHEDULES_TABLE,
            &[
                date_filter("date", date),
                ("order", "start_time.asc".to_string()),
            ],
        )
        .await
    }

    async fn list_schedules_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Schedule>, PlannerError> {
        self.select_rows(
            SCHEDULES_TABLE,
            &[
                ("date", format!("gte.{}", from.format("%Y-%m-%d"))),
                ("date", format!("lte.{}", to.format("%Y-%m-%d"))),
                ("order", "date.asc,start_time.asc".to_string()),
            ],
        )
        .await
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, PlannerError> {
        let rows: Vec<Schedule> = self
            .select_rows(SCHEDULES_TABLE, &[("id", format!("eq.{id}"))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_schedule(&self, schedule: Schedule) -> Result<Schedule, PlannerError> {
        // The table carries a unique index on (routine_id, date); a conflict
        // means the routine was already materialized for that day.
        match self.insert_row(SCHEDULES_TABLE, &schedule).await {
            Err(PlannerError::Provider(message)) if message.contains("http 409") => {
                Err(PlannerError::DuplicateOccurrence {
                    routine_id: schedule.routine_id.unwrap_or_default(),
                    date: schedule.date.format("%Y-%m-%d").to_string(),
                })
            }
            other => other,
        }
    }

    async fn update_schedule(&self, schedule: Schedule) -> Result<Schedule, PlannerError> {
        self.update_row(SCHEDULES_TABLE, &schedule.id, &schedule)
            .await
    }

    async fn delete_schedule(&self, id: &str) -> Result<(), PlannerError> {
        self.delete_row(SCHEDULES_TABLE, id).await
    }
}

#[async_trait]
impl RoutineRepository for RestProviderClient {
    async fn list_routines(&self) -> Result<Vec<Routine>, PlannerError> {
        self.select_rows(ROUTINES_TABLE, &[("order", "created_at.asc".to_string())])
            .await
    }

    async fn get_routine(&self, id: &str) -> Result<Option<Routine>, PlannerError> {
        let rows: Vec<Routine> = self
            .select_rows(ROUTINES_TABLE, &[("id", format!("eq.{id}"))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_routine(&self, routine: Routine) -> Result<Routine, PlannerError> {
        self.insert_row(ROUTINES_TABLE, &routine).await
    }

    async fn update_routine(&self, routine: Routine) -> Result<Routine, PlannerError> {
        self.update_row(ROUTINES_TABLE, &routine.id, &routine)
            .await
    }

    async fn delete_routine(&self, id: &str) -> Result<(), PlannerError> {
        self.delete_row(ROUTINES_TABLE, id).await
    }
}

#[async_trait]
impl WeekRepository for RestProviderClient {
    async fn get_week(&self, week_id: &str) -> Result<Option<Week>, PlannerError> {
        let rows: Vec<Week> = self
            .select_rows(WEEKS_TABLE, &[("id", format!("eq.{week_id}"))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_or_create_week(
        &self,
        week_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Week, PlannerError> {
        if let Some(existing) = self.get_week(week_id).await? {
            return Ok(existing);
        }
        let week = Week {
            id: week_id.to_string(),
            start_date,
            end_date,
            goals: Vec::new(),
            weekly_goals: Vec::new(),
        };
        match self.insert_row(WEEKS_TABLE, &week).await {
            // A concurrent client created it first; read theirs back.
            Err(PlannerError::Provider(message)) if message.contains("http 409") => self
                .get_week(week_id)
                .await?
                .ok_or_else(|| PlannerError::Provider(format!("week {week_id} vanished"))),
            other => other,
        }
    }

    async fn update_week(&self, week: Week) -> Result<Week, PlannerError> {
        self.update_row(WEEKS_TABLE, &week.id, &week).await
    }
}
