use crate::domain::models::ExternalEvent;
use crate::infrastructure::error::PlannerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use url::Url;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

/// Google's event colorId palette. Events without a colorId fall back to the
/// per-calendar default.
const EVENT_COLOR_PALETTE: [(&str, &str); 11] = [
    ("1", "#7986CB"),
    ("2", "#33B679"),
    ("3", "#8E24AA"),
    ("4", "#E67C73"),
    ("5", "#F6BF26"),
    ("6", "#F4511E"),
    ("7", "#039BE5"),
    ("8", "#616161"),
    ("9", "#3F51B5"),
    ("10", "#0B8043"),
    ("11", "#D50000"),
];

pub fn event_color(color_id: Option<&str>, calendar_default: Option<&str>) -> Option<String> {
    if let Some(color_id) = color_id.map(str::trim).filter(|value| !value.is_empty()) {
        if let Some((_, hex)) = EVENT_COLOR_PALETTE
            .iter()
            .find(|(candidate, _)| *candidate == color_id)
        {
            return Some((*hex).to_string());
        }
    }
    calendar_default.map(ToOwned::to_owned)
}

#[derive(Debug, Clone)]
pub struct FeedCalendar {
    pub id: String,
    /// Default color applied to events that carry no colorId of their own.
    pub color: Option<String>,
}

/// Read-only view onto an external calendar. Nothing in this crate writes
/// back through it.
#[async_trait]
pub trait CalendarFeedClient: Send + Sync {
    async fn list_events(
        &self,
        access_token: &str,
        calendar: &FeedCalendar,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>, PlannerError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestCalendarFeedClient {
    client: Client,
}

impl ReqwestCalendarFeedClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), PlannerError> {
        if value.trim().is_empty() {
            return Err(PlannerError::CalendarFeed(format!(
                "{field} must not be empty"
            )));
        }
        Ok(())
    }

    fn feed_http_error(status: reqwest::StatusCode, body: &str) -> PlannerError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return PlannerError::CalendarSessionExpired;
        }
        let message = if body.trim().is_empty() {
            format!("calendar api error: http {}", status.as_u16())
        } else {
            format!("calendar api error: http {}; body={body}", status.as_u16())
        };
        PlannerError::CalendarFeed(message)
    }

    fn events_endpoint(calendar_id: &str) -> Result<Url, PlannerError> {
        let mut url = Url::parse(CALENDAR_API_BASE).map_err(|error| {
            PlannerError::CalendarFeed(format!("invalid calendar api base url: {error}"))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                PlannerError::CalendarFeed("calendar api base URL cannot be a base".to_string())
            })?;
            segments.push("calendars");
            segments.push(calendar_id);
            segments.push("events");
        }
        Ok(url)
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventTimeResponse {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTimeResponse {
    fn instant(&self) -> Option<(String, bool)> {
        if let Some(date_time) = self.date_time.as_deref() {
            return Some((date_time.to_string(), false));
        }
        self.date.as_deref().map(|date| (date.to_string(), true))
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventResponse {
    id: Option<String>,
    summary: Option<String>,
    status: Option<String>,
    location: Option<String>,
    #[serde(rename = "colorId")]
    color_id: Option<String>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
    start: Option<EventTimeResponse>,
    end: Option<EventTimeResponse>,
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<EventResponse>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

fn map_event(item: EventResponse, calendar: &FeedCalendar) -> Option<ExternalEvent> {
    if item.status.as_deref() == Some("cancelled") {
        return None;
    }
    let id = item.id.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
    let (start, start_all_day) = item.start.as_ref().and_then(EventTimeResponse::instant)?;
    let (end, _) = item.end.as_ref().and_then(EventTimeResponse::instant)?;

    Some(ExternalEvent {
        id: id.to_string(),
        calendar_id: calendar.id.clone(),
        title: item
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("(제목 없음)")
            .to_string(),
        start,
        end,
        is_all_day: start_all_day,
        location: item
            .location
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned),
        color: event_color(item.color_id.as_deref(), calendar.color.as_deref()),
        html_link: item.html_link,
    })
}

#[async_trait]
impl CalendarFeedClient for ReqwestCalendarFeedClient {
    async fn list_events(
        &self,
        access_token: &str,
        calendar: &FeedCalendar,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>, PlannerError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(&calendar.id, "calendar id")?;

        let endpoint = Self::events_endpoint(&calendar.id)?;
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut req = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", "2500"),
                ])
                .query(&[
                    ("timeMin", time_min.to_rfc3339()),
                    ("timeMax", time_max.to_rfc3339()),
                ]);

            if let Some(page_token) = page_token.as_deref() {
                req = req.query(&[("pageToken", page_token)]);
            }

            let response = req.send().await?;
            let status = response.status();
            let body = response.text().await.map_err(|error| {
                PlannerError::CalendarFeed(format!("failed reading events response: {error}"))
            })?;

            if !status.is_success() {
                return Err(Self::feed_http_error(status, &body));
            }

            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                PlannerError::CalendarFeed(format!("invalid events payload: {error}; body={body}"))
            })?;

            events.extend(
                parsed
                    .items
                    .take()
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|item| map_event(item, calendar)),
            );

            if let Some(next_page_token) = parsed.next_page_token.take() {
                page_token = Some(next_page_token);
                continue;
            }
            break;
        }

        Ok(events)
    }
}
