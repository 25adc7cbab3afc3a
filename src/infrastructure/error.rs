use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Routine {routine_id} already materialized on {date}")]
    DuplicateOccurrence { routine_id: String, date: String },
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Calendar feed error: {0}")]
    CalendarFeed(String),
    #[error("Calendar session expired")]
    CalendarSessionExpired,
    #[error("Network error: {0}")]
    Network(String),
}

impl PlannerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PlannerError::Network(_))
    }
}

impl From<reqwest::Error> for PlannerError {
    fn from(error: reqwest::Error) -> Self {
        PlannerError::Network(error.to_string())
    }
}
