//! VictorOps (Splunk On-Call) public API client.
//!
//! Responses are decoded into wire types and converted once into the typed
//! [`Team`], [`ScheduleEntry`] and [`Roll`] values the rest of the crate uses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cfg::RosterConfig;
use crate::error::{RemoteOperation, Result, SyncError};

const API_ID_HEADER: &str = "X-VO-Api-Id";
const API_KEY_HEADER: &str = "X-VO-Api-Key";
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Team {
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

impl Team {
    /// Display name, falling back to the slug for unnamed teams.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.slug
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScheduleEntry {
    pub rotation_name: Option<String>,
    pub rolls: Vec<Roll>,
}

/// One on-call window. Fields the API left out or sent malformed are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roll {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleFetch {
    Entries(Vec<ScheduleEntry>),
    /// The API answered successfully but reported zero schedules.
    NoData,
}

#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn list_teams(&self) -> Result<Vec<Team>>;

    async fn get_schedule(&self, team_slug: &str) -> Result<ScheduleFetch>;
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    schedules: Option<Vec<PolicySchedule>>,
}

#[derive(Debug, Deserialize)]
struct PolicySchedule {
    #[serde(default)]
    schedule: Option<Vec<RawScheduleEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawScheduleEntry {
    #[serde(default, rename = "rotationName")]
    rotation_name: Option<String>,
    #[serde(default)]
    rolls: Option<Vec<RawRoll>>,
}

#[derive(Debug, Deserialize)]
struct RawRoll {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default, rename = "onCallUser")]
    on_call_user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    username: Option<serde_json::Value>,
}

impl From<RawScheduleEntry> for ScheduleEntry {
    fn from(raw: RawScheduleEntry) -> Self {
        ScheduleEntry {
            rotation_name: raw.rotation_name,
            rolls: raw.rolls.unwrap_or_default().into_iter().map(Roll::from).collect(),
        }
    }
}

impl From<RawRoll> for Roll {
    fn from(raw: RawRoll) -> Self {
        Roll {
            start: raw.start.as_deref().and_then(|s| parse_timestamp("start", s)),
            end: raw.end.as_deref().and_then(|s| parse_timestamp("end", s)),
            username: raw
                .on_call_user
                .and_then(|user| user.username)
                .and_then(username_text),
        }
    }
}

fn parse_timestamp(field: &str, value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!("Ignoring malformed roll {} timestamp '{}': {}", field, value, e);
            None
        }
    }
}

fn username_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

pub struct VictorOpsClient {
    http: Client,
    base_url: Url,
}

impl VictorOpsClient {
    pub fn new(cfg: &RosterConfig) -> Result<Self> {
        let base_url = Url::parse(&cfg.api_base)
            .map_err(|e| SyncError::Config(format!("invalid roster.api_base '{}': {}", cfg.api_base, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "roster.api_base must be an absolute URL, got '{}'",
                cfg.api_base
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(API_ID_HEADER, header_value("roster.org_id", &cfg.org_id)?);
        let mut key = header_value("roster.api_key", &cfg.api_key)?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = cfg.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    fn url_with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: RemoteOperation, url: Url) -> Result<T> {
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::remote(operation, e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::remote(operation, Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(SyncError::remote(
                operation,
                Some(status.as_u16()),
                format!("unexpected response: {}", snippet),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            SyncError::remote(operation, Some(status.as_u16()), format!("invalid response body: {}", e))
        })
    }
}

fn header_value(key: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value.trim())
        .map_err(|_| SyncError::Config(format!("{} contains characters not allowed in an HTTP header", key)))
}

#[async_trait]
impl RosterSource for VictorOpsClient {
    async fn list_teams(&self) -> Result<Vec<Team>> {
        let url = self.url_with_segments(&["v1", "team"]);
        let teams: Vec<Team> = self.get_json(RemoteOperation::ListTeams, url).await?;
        info!("Fetched {} teams", teams.len());
        Ok(teams)
    }

    async fn get_schedule(&self, team_slug: &str) -> Result<ScheduleFetch> {
        let url = self.url_with_segments(&["v2", "team", team_slug, "oncall", "schedule"]);
        let response: ScheduleResponse = self.get_json(RemoteOperation::GetSchedule, url).await?;

        let schedules = response.schedules.unwrap_or_default();
        if schedules.is_empty() {
            return Ok(ScheduleFetch::NoData);
        }

        let entries: Vec<ScheduleEntry> = schedules
            .into_iter()
            .flat_map(|policy| policy.schedule.unwrap_or_default())
            .map(ScheduleEntry::from)
            .collect();
        debug!("Team {} has {} schedule entries", team_slug, entries.len());
        Ok(ScheduleFetch::Entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_cfg(api_base: &str) -> RosterConfig {
        RosterConfig {
            api_base: api_base.to_string(),
            org_id: "acme".to_string(),
            api_key: "secret".to_string(),
            timeout_secs: None,
        }
    }

    fn ts(s: &str) -> Option<DateTime<Utc>> {
        Some(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc))
    }

    #[tokio::test]
    async fn list_teams_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/team"))
            .and(header("X-VO-Api-Id", "acme"))
            .and(header("X-VO-Api-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"slug": "t1", "name": "Team One", "memberCount": 3},
                {"slug": "t2", "name": "Team Two"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = VictorOpsClient::new(&test_cfg(&server.uri())).unwrap();
        let teams = client.list_teams().await.unwrap();

        assert_eq!(
            teams,
            vec![
                Team { slug: "t1".into(), name: "Team One".into() },
                Team { slug: "t2".into(), name: "Team Two".into() },
            ]
        );
    }

    #[tokio::test]
    async fn list_teams_keeps_base_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api-public/v1/team"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = VictorOpsClient::new(&test_cfg(&format!("{}/api-public", server.uri()))).unwrap();
        assert!(client.list_teams().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_a_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/team"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = VictorOpsClient::new(&test_cfg(&server.uri())).unwrap();
        let err = client.list_teams().await.unwrap_err();

        match err {
            SyncError::Remote { operation, status, message } => {
                assert_eq!(operation, RemoteOperation::ListTeams);
                assert_eq!(status, Some(403));
                assert!(message.contains("forbidden"));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_a_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/team"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Error"))
            .mount(&server)
            .await;

        let client = VictorOpsClient::new(&test_cfg(&server.uri())).unwrap();
        let err = client.list_teams().await.unwrap_err();

        assert!(matches!(err, SyncError::Remote { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn transport_failure_has_no_status() {
        let client = VictorOpsClient::new(&test_cfg("http://127.0.0.1:1")).unwrap();
        let err = client.list_teams().await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::Remote { operation: RemoteOperation::ListTeams, status: None, .. }
        ));
    }

    #[tokio::test]
    async fn schedule_entries_are_concatenated_across_policies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/team/t1/oncall/schedule"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "team": {"name": "Team One", "slug": "t1"},
                "schedules": [
                    {
                        "policy": {"name": "Primary", "slug": "pol-1"},
                        "schedule": [{
                            "rotationName": "Weekly",
                            "rolls": [{
                                "start": "2024-01-01T10:00:00Z",
                                "end": "2024-01-01T18:00:00Z",
                                "onCallUser": {"username": "alice"}
                            }]
                        }]
                    },
                    {
                        "policy": {"name": "Backup", "slug": "pol-2"},
                        "schedule": [{"rolls": []}, {"rolls": null}]
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = VictorOpsClient::new(&test_cfg(&server.uri())).unwrap();
        let fetch = client.get_schedule("t1").await.unwrap();

        let ScheduleFetch::Entries(entries) = fetch else {
            panic!("expected entries");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].rotation_name.as_deref(), Some("Weekly"));
        assert_eq!(
            entries[0].rolls,
            vec![Roll {
                start: ts("2024-01-01T10:00:00Z"),
                end: ts("2024-01-01T18:00:00Z"),
                username: Some("alice".into()),
            }]
        );
        assert!(entries[1].rolls.is_empty());
        assert!(entries[2].rolls.is_empty());
    }

    #[tokio::test]
    async fn empty_or_missing_schedules_mean_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/team/empty/oncall/schedule"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"schedules": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/team/bare/oncall/schedule"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"team": {}})))
            .mount(&server)
            .await;

        let client = VictorOpsClient::new(&test_cfg(&server.uri())).unwrap();

        assert_eq!(client.get_schedule("empty").await.unwrap(), ScheduleFetch::NoData);
        assert_eq!(client.get_schedule("bare").await.unwrap(), ScheduleFetch::NoData);
    }

    #[tokio::test]
    async fn slug_is_encoded_as_a_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/team/ops%2Fnight/oncall/schedule"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"schedules": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = VictorOpsClient::new(&test_cfg(&server.uri())).unwrap();
        assert_eq!(client.get_schedule("ops/night").await.unwrap(), ScheduleFetch::NoData);
    }

    #[tokio::test]
    async fn schedule_failure_reports_operation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/team/t1/oncall/schedule"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = VictorOpsClient::new(&test_cfg(&server.uri())).unwrap();
        let err = client.get_schedule("t1").await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::Remote { operation: RemoteOperation::GetSchedule, status: Some(500), .. }
        ));
    }

    #[test]
    fn malformed_roll_fields_become_none() {
        let raw: RawRoll = serde_json::from_value(json!({
            "start": "yesterday",
            "onCallUser": {"username": 42}
        }))
        .unwrap();

        let roll = Roll::from(raw);

        assert_eq!(roll.start, None);
        assert_eq!(roll.end, None);
        assert_eq!(roll.username.as_deref(), Some("42"));
    }

    #[test]
    fn team_without_name_displays_slug() {
        let team: Team = serde_json::from_value(json!({"slug": "noc"})).unwrap();
        assert_eq!(team.display_name(), "noc");
    }

    #[test]
    fn invalid_header_value_is_a_config_error() {
        let mut cfg = test_cfg("https://api.victorops.com/api-public");
        cfg.api_key = "bad\nkey".to_string();
        assert!(matches!(VictorOpsClient::new(&cfg), Err(SyncError::Config(_))));
    }
}
