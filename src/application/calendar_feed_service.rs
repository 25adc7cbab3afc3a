use crate::domain::models::ExternalEvent;
use crate::infrastructure::calendar_feed::{CalendarFeedClient, FeedCalendar};
use crate::infrastructure::error::PlannerError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{sleep, Duration as TokioDuration};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

/// Feed fetch result. `advisory` is set when the feed degraded to empty
/// instead of failing (no session, or the session expired mid-fetch).
#[derive(Debug, Clone, Default)]
pub struct FeedResult {
    pub events: Vec<ExternalEvent>,
    pub advisory: Option<String>,
}

pub struct CalendarFeedService<C>
where
    C: CalendarFeedClient,
{
    client: Arc<C>,
    retry_policy: RetryPolicy,
}

impl<C> CalendarFeedService<C>
where
    C: CalendarFeedClient,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Fetches events across the selected calendars. A missing or expired
    /// session yields an empty result with an advisory rather than an
    /// error; the planner view renders without the feed.
    pub async fn fetch_events(
        &self,
        access_token: Option<&str>,
        calendars: &[FeedCalendar],
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<FeedResult, PlannerError> {
        let Some(token) = access_token.map(str::trim).filter(|value| !value.is_empty())
        else {
            return Ok(FeedResult {
                events: Vec::new(),
                advisory: Some("calendar not connected".to_string()),
            });
        };

        let mut events = Vec::new();
        for calendar in calendars {
            match self
                .list_events_with_retry(token, calendar, time_min, time_max)
                .await
            {
                Ok(mut fetched) => events.append(&mut fetched),
                Err(PlannerError::CalendarSessionExpired) => {
                    return Ok(FeedResult {
                        events: Vec::new(),
                        advisory: Some(
                            "calendar session expired; reconnect to see events".to_string(),
                        ),
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(FeedResult {
            events,
            advisory: None,
        })
    }

    async fn list_events_with_retry(
        &self,
        access_token: &str,
        calendar: &FeedCalendar,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>, PlannerError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self
                .client
                .list_events(access_token, calendar, time_min, time_max)
                .await
            {
                Ok(events) => return Ok(events),
                Err(error) if error.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt as u32));
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }
}
