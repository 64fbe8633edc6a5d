//! Client for the campus directory API (teams, projects).
//!
//! Authentication is OAuth2 client-credentials; the token is fetched once and
//! reused for the life of the client. List endpoints are paginated and read
//! page by page until an empty page comes back.

use crate::config::DirectoryConfig;
use crate::error::{Result, WatchError};
use crate::types::{format_directory_time, Project, Team};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;

// ---------------------------------------------------------------------------
// TeamQuery
// ---------------------------------------------------------------------------

/// One curriculum track's worth of candidate teams.
#[derive(Debug, Clone)]
pub struct TeamQuery {
    pub campus: u64,
    pub track: u64,
    pub created_from: DateTime<Utc>,
    pub created_until: DateTime<Utc>,
    pub page_size: u32,
}

impl TeamQuery {
    pub fn params(&self) -> Vec<(String, String)> {
        vec![
            ("filter[primary_campus]".into(), self.campus.to_string()),
            ("filter[active_cursus]".into(), self.track.to_string()),
            ("filter[closed]".into(), "false".into()),
            (
                "range[created_at]".into(),
                format!(
                    "{},{}",
                    format_directory_time(self.created_from),
                    format_directory_time(self.created_until)
                ),
            ),
            ("page[size]".into(), self.page_size.to_string()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Directory: Send + Sync {
    /// Every team matching `query`, across all pages.
    async fn teams(&self, query: &TeamQuery) -> Result<Vec<Team>>;

    async fn team(&self, id: u64) -> Result<Team>;

    async fn project(&self, id: u64) -> Result<Project>;

    /// Submit both closure timestamps in a single update.
    async fn close_team(
        &self,
        id: u64,
        closed_at: DateTime<Utc>,
        terminating_at: DateTime<Utc>,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// DirectoryClient
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: OnceCell<String>,
}

impl DirectoryClient {
    pub fn new(
        http: reqwest::Client,
        config: &DirectoryConfig,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: OnceCell::new(),
        }
    }

    /// Fetch the access token up front so bad credentials fail the run early.
    pub async fn authenticate(&self) -> Result<()> {
        self.token().await.map(|_| ())
    }

    async fn token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                    ("scope", "public projects"),
                ];
                let resp = self.http.post(&self.token_url).form(&form).send().await?;
                let body = checked(resp).await?;
                let parsed: TokenResponse = serde_json::from_str(&body)?;
                tracing::debug!("directory token acquired");
                Ok::<_, WatchError>(parsed.access_token)
            })
            .await?;
        Ok(token.as_str())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let token = self.token().await?;
        let resp = self
            .http
            .get(self.endpoint(path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        let body = checked(resp).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

async fn checked(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(WatchError::Http {
            service: "Directory",
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn not_found_as(err: WatchError, missing: WatchError) -> WatchError {
    match err {
        WatchError::Http { status: 404, .. } => missing,
        other => other,
    }
}

#[async_trait]
impl Directory for DirectoryClient {
    async fn teams(&self, query: &TeamQuery) -> Result<Vec<Team>> {
        let base = query.params();
        let mut teams = Vec::new();
        let mut page_number = 1u32;
        loop {
            let mut params = base.clone();
            params.push(("page[number]".into(), page_number.to_string()));
            let page: Vec<Team> = self.get_json("teams", &params).await?;
            tracing::debug!(track = query.track, page = page_number, count = page.len(), "teams page");
            if page.is_empty() {
                break;
            }
            teams.extend(page);
            page_number += 1;
        }
        Ok(teams)
    }

    async fn team(&self, id: u64) -> Result<Team> {
        self.get_json(&format!("teams/{id}"), &[])
            .await
            .map_err(|e| not_found_as(e, WatchError::TeamNotFound(id)))
    }

    async fn project(&self, id: u64) -> Result<Project> {
        self.get_json(&format!("projects/{id}"), &[])
            .await
            .map_err(|e| not_found_as(e, WatchError::ProjectNotFound(id)))
    }

    async fn close_team(
        &self,
        id: u64,
        closed_at: DateTime<Utc>,
        terminating_at: DateTime<Utc>,
    ) -> Result<()> {
        let token = self.token().await?;
        let form = [
            ("team[closed_at]", format_directory_time(closed_at)),
            ("team[terminating_at]", format_directory_time(terminating_at)),
        ];
        let resp = self
            .http
            .patch(self.endpoint(&format!("teams/{id}")))
            .bearer_auth(token)
            .form(&form)
            .send()
            .await?;
        checked(resp).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory directory: teams per track, projects by id, recorded closures.
    #[derive(Default)]
    pub(crate) struct FakeDirectory {
        pub(crate) by_track: HashMap<u64, Vec<Team>>,
        pub(crate) projects: HashMap<u64, Project>,
        pub(crate) fail_close: bool,
        pub(crate) closed: Mutex<Vec<(u64, DateTime<Utc>, DateTime<Utc>)>>,
        pub(crate) queries: Mutex<Vec<TeamQuery>>,
        pub(crate) lookups: Mutex<usize>,
    }

    impl FakeDirectory {
        pub(crate) fn with_track(mut self, track: u64, teams: Vec<Team>) -> Self {
            self.by_track.insert(track, teams);
            self
        }

        pub(crate) fn with_project(mut self, project: Project) -> Self {
            self.projects.insert(project.id, project);
            self
        }

        pub(crate) fn project_lookups(&self) -> usize {
            *self.lookups.lock().unwrap()
        }
    }

    #[async_trait]
    impl Directory for FakeDirectory {
        async fn teams(&self, query: &TeamQuery) -> Result<Vec<Team>> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.by_track.get(&query.track).cloned().unwrap_or_default())
        }

        async fn team(&self, id: u64) -> Result<Team> {
            self.by_track
                .values()
                .flatten()
                .find(|t| t.id == id)
                .cloned()
                .ok_or(WatchError::TeamNotFound(id))
        }

        async fn project(&self, id: u64) -> Result<Project> {
            *self.lookups.lock().unwrap() += 1;
            self.projects
                .get(&id)
                .cloned()
                .ok_or(WatchError::ProjectNotFound(id))
        }

        async fn close_team(
            &self,
            id: u64,
            closed_at: DateTime<Utc>,
            terminating_at: DateTime<Utc>,
        ) -> Result<()> {
            if self.fail_close {
                return Err(WatchError::Http {
                    service: "Directory",
                    status: 422,
                    body: "locked".into(),
                });
            }
            self.closed.lock().unwrap().push((id, closed_at, terminating_at));
            Ok(())
        }
    }

    async fn client_for(server: &mockito::ServerGuard) -> DirectoryClient {
        let config = DirectoryConfig {
            base_url: format!("{}/v2/", server.url()),
            token_url: format!("{}/oauth/token", server.url()),
            page_size: 2,
        };
        DirectoryClient::new(reqwest::Client::new(), &config, "id", "secret")
    }

    async fn token_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "id".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok","token_type":"bearer","expires_in":7200}"#)
            .expect(1)
            .create_async()
            .await
    }

    fn team_json(id: u64) -> String {
        format!(
            r#"{{"id":{id},"name":"t{id}","project_id":1314,"repo_url":"git@vogsphere.example.org:x/t{id}",
               "repo_uuid":"u{id}","users":[{{"id":1,"login":"alice"}}],"status":"in_progress",
               "created_at":"2024-01-02T09:00:00.000Z","locked_at":"2024-01-02T09:30:00.000Z","closed_at":null,"terminating_at":null}}"#
        )
    }

    fn query() -> TeamQuery {
        TeamQuery {
            campus: 7,
            track: 21,
            created_from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            created_until: Utc.with_ymd_and_hms(2024, 3, 6, 7, 0, 0).unwrap(),
            page_size: 2,
        }
    }

    #[test]
    fn query_params_scope_the_search() {
        let params = query().params();
        let get = |k: &str| {
            params
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("filter[primary_campus]"), "7");
        assert_eq!(get("filter[active_cursus]"), "21");
        assert_eq!(get("filter[closed]"), "false");
        assert_eq!(
            get("range[created_at]"),
            "2024-01-01T00:00:00.000Z,2024-03-06T07:00:00.000Z"
        );
    }

    #[tokio::test]
    async fn teams_reads_pages_until_empty() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server).await;
        let mut page = |n: &str, body: String| {
            server
                .mock("GET", "/v2/teams")
                .match_header("authorization", "Bearer tok")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("page[number]".into(), n.into()),
                    Matcher::UrlEncoded("filter[active_cursus]".into(), "21".into()),
                ]))
                .with_status(200)
                .with_body(body)
                .expect(1)
        };
        let p1 = page("1", format!("[{},{}]", team_json(1), team_json(2)))
            .create_async()
            .await;
        let p2 = page("2", format!("[{}]", team_json(3))).create_async().await;
        let p3 = page("3", "[]".to_string()).create_async().await;

        let client = client_for(&server).await;
        let teams = client.teams(&query()).await.unwrap();
        let ids: Vec<u64> = teams.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        token.assert_async().await;
        p1.assert_async().await;
        p2.assert_async().await;
        p3.assert_async().await;
    }

    #[tokio::test]
    async fn missing_team_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let _m = server
            .mock("GET", "/v2/teams/99")
            .with_status(404)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.team(99).await.unwrap_err();
        assert!(matches!(err, WatchError::TeamNotFound(99)));
    }

    #[tokio::test]
    async fn project_by_id() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let _m = server
            .mock("GET", "/v2/projects/1314")
            .with_status(200)
            .with_body(r#"{"id":1314,"name":"ft_ls","slug":"ft_ls","exam":false}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.project(1314).await.unwrap().name, "ft_ls");
    }

    #[tokio::test]
    async fn close_team_patches_both_timestamps() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let patch = server
            .mock("PATCH", "/v2/teams/42")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("team[closed_at]".into(), "2024-03-05T07:00:00.000Z".into()),
                Matcher::UrlEncoded(
                    "team[terminating_at]".into(),
                    "2024-03-10T07:00:00.000Z".into(),
                ),
            ]))
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server).await;
        client
            .close_team(
                42,
                Utc.with_ymd_and_hms(2024, 3, 5, 7, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn bad_credentials_fail_authentication() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, WatchError::Http { status: 401, .. }));
    }
}
