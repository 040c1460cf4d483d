//! Read side of the `clock_events` table, through the PostgREST API.

use super::ClockType;
use crate::APP_USER_AGENT;
use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

const EVENTS_PATH: &str = "/rest/v1/clock_events";

/// A recorded clock event.
#[derive(Clone, Debug, PartialEq)]
pub struct ClockEvent {
    pub id: String,
    pub employee_id: Option<Uuid>,
    pub site_id: String,
    pub site_name: Option<String>,
    pub kind: ClockType,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lng: f64,
    pub accuracy_meters: Option<f64>,
    pub device_label: Option<String>,
    pub status: String,
}

#[derive(Deserialize)]
struct SiteRef {
    name: String,
}

#[derive(Deserialize)]
struct ClockEventRow {
    id: String,
    employee_id: Option<Uuid>,
    site_id: String,
    #[serde(rename = "type")]
    kind: ClockType,
    timestamp: DateTime<Utc>,
    lat: f64,
    lng: f64,
    accuracy_meters: Option<f64>,
    device_label: Option<String>,
    status: String,
    #[serde(default)]
    sites: Option<SiteRef>,
}

impl From<ClockEventRow> for ClockEvent {
    fn from(row: ClockEventRow) -> Self {
        Self {
            id: row.id,
            employee_id: row.employee_id,
            site_id: row.site_id,
            site_name: row.sites.map(|site| site.name),
            kind: row.kind,
            timestamp: row.timestamp,
            lat: row.lat,
            lng: row.lng,
            accuracy_meters: row.accuracy_meters,
            device_label: row.device_label,
            status: row.status,
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("clock history request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("clock history returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid clock history: {0}")]
    InvalidResponse(String),
}

/// Local midnight to the last millisecond of the day containing `now`.
#[must_use]
pub fn day_bounds(now: DateTime<Local>) -> (DateTime<Utc>, DateTime<Utc>) {
    let date = now.date_naive();
    let local_start = date.and_time(NaiveTime::default());
    let local_end = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or(local_start);

    // earliest/latest resolve DST gaps and folds
    let start = Local
        .from_local_datetime(&local_start)
        .earliest()
        .map_or_else(|| now.with_timezone(&Utc), |start| start.with_timezone(&Utc));
    let end = Local
        .from_local_datetime(&local_end)
        .latest()
        .map_or_else(|| now.with_timezone(&Utc), |end| end.with_timezone(&Utc));

    (start, end)
}

pub struct HistoryClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HistoryClient {
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: SecretString) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            api_key,
        })
    }

    async fn fetch(
        &self,
        access_token: &SecretString,
        query: &[(&str, String)],
    ) -> Result<Vec<ClockEvent>, HistoryError> {
        let mut url = self
            .base_url
            .join(EVENTS_PATH)
            .map_err(|e| HistoryError::InvalidResponse(e.to_string()))?;
        url.query_pairs_mut().extend_pairs(query);

        debug!("fetching clock events: {}", url);

        let response = self
            .client
            .get(url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| status.to_string(), str::to_string);
            return Err(HistoryError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let rows: Vec<ClockEventRow> = response
            .json()
            .await
            .map_err(|e| HistoryError::InvalidResponse(e.to_string()))?;

        Ok(rows.into_iter().map(ClockEvent::from).collect())
    }

    /// Most recent event of the employee, if any.
    ///
    /// # Errors
    /// Returns an error if the request fails or the rows can't be parsed.
    #[instrument(skip(self, access_token))]
    pub async fn last_event(
        &self,
        access_token: &SecretString,
        employee_id: Uuid,
    ) -> Result<Option<ClockEvent>, HistoryError> {
        let events = self
            .fetch(
                access_token,
                &[
                    ("select", "*,sites(name)".to_string()),
                    ("employee_id", format!("eq.{employee_id}")),
                    ("order", "timestamp.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        Ok(events.into_iter().next())
    }

    /// Events of the local day containing `now`, oldest first.
    ///
    /// # Errors
    /// Returns an error if the request fails or the rows can't be parsed.
    #[instrument(skip(self, access_token))]
    pub async fn events_on(
        &self,
        access_token: &SecretString,
        employee_id: Uuid,
        now: DateTime<Local>,
    ) -> Result<Vec<ClockEvent>, HistoryError> {
        let (start, end) = day_bounds(now);

        self.fetch(
            access_token,
            &[
                ("select", "*,sites!inner(name)".to_string()),
                ("employee_id", format!("eq.{employee_id}")),
                ("timestamp", format!("gte.{}", start.to_rfc3339())),
                ("timestamp", format!("lte.{}", end.to_rfc3339())),
                ("order", "timestamp.asc".to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EMPLOYEE: &str = "0b3f6f1e-8c7a-4f55-9a51-2f1f3c2a9d10";

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn row(id: &str, kind: &str, timestamp: &str) -> Value {
        json!({
            "id": id,
            "employee_id": EMPLOYEE,
            "site_id": "site-1",
            "type": kind,
            "timestamp": timestamp,
            "lat": 38.58,
            "lng": -121.49,
            "accuracy_meters": 8.0,
            "device_label": "linux x86_64",
            "status": "OK",
            "created_at": timestamp,
            "sites": { "name": "Sacramento Yard" }
        })
    }

    #[test]
    fn test_day_bounds_cover_the_local_day() {
        let now = Local::now();
        let (start, end) = day_bounds(now);
        assert!(start <= now.with_timezone(&Utc));
        assert!(end >= now.with_timezone(&Utc));
        assert_eq!(start.with_timezone(&Local).date_naive(), now.date_naive());
        assert_eq!(end.with_timezone(&Local).date_naive(), now.date_naive());
    }

    #[test]
    fn test_row_without_site_join() {
        let mut value = row("e1", "OUT", "2025-03-01T17:00:00+00:00");
        value.as_object_mut().unwrap().remove("sites");
        let event = ClockEvent::from(serde_json::from_value::<ClockEventRow>(value).unwrap());
        assert_eq!(event.kind, ClockType::Out);
        assert!(event.site_name.is_none());
    }

    #[tokio::test]
    async fn test_last_event() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(query_param("employee_id", format!("eq.{EMPLOYEE}")))
            .and(query_param("order", "timestamp.desc"))
            .and(query_param("limit", "1"))
            .and(header("authorization", "Bearer a1"))
            .and(header("apikey", "anon-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([row("e2", "IN", "2025-03-01T08:00:00+00:00")])),
            )
            .mount(&server)
            .await;

        let client = HistoryClient::new(&server.uri(), SecretString::from("anon-key")).unwrap();
        let event = client
            .last_event(&SecretString::from("a1"), Uuid::parse_str(EMPLOYEE).unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(event.id, "e2");
        assert_eq!(event.kind, ClockType::In);
        assert_eq!(event.site_name.as_deref(), Some("Sacramento Yard"));
        assert_eq!(event.timestamp.to_rfc3339(), "2025-03-01T08:00:00+00:00");
    }

    #[tokio::test]
    async fn test_events_on_orders_ascending() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(query_param("select", "*,sites!inner(name)"))
            .and(query_param("order", "timestamp.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                row("e1", "IN", "2025-03-01T08:00:00+00:00"),
                row("e2", "OUT", "2025-03-01T12:00:00+00:00"),
            ])))
            .mount(&server)
            .await;

        let client = HistoryClient::new(&server.uri(), SecretString::from("anon-key")).unwrap();
        let events = client
            .events_on(
                &SecretString::from("a1"),
                Uuid::parse_str(EMPLOYEE).unwrap(),
                Local::now(),
            )
            .await
            .unwrap();

        assert_eq!(
            events.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["e1", "e2"]
        );
    }

    #[tokio::test]
    async fn test_status_error_carries_message() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })),
            )
            .mount(&server)
            .await;

        let client = HistoryClient::new(&server.uri(), SecretString::from("anon-key")).unwrap();
        let err = client
            .last_event(&SecretString::from("a1"), Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(
            matches!(err, HistoryError::Status { status: 401, ref message } if message == "JWT expired")
        );
    }
}
