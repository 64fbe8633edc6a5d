//! Vacation credit: approved absences that push a team's deadline back.
//!
//! Each member's windows are clipped to the evaluation interval and counted
//! in whole inclusive days. The team's credit is the average over its
//! members, so one long absence only partly offsets idle teammates.

use crate::context::local_midnight;
use crate::error::{Result, WatchError};
use crate::types::{Team, VacationWindow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

// ---------------------------------------------------------------------------
// Pure day arithmetic
// ---------------------------------------------------------------------------

/// Days of the inclusive window `[window_start, window_end]` that fall inside
/// `[start, end]`. Partial days round up.
pub fn overlap_days(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> i64 {
    if window_end < start || window_start > end {
        return 0;
    }
    let from = start.max(window_start);
    let to = end.min(window_end);
    if to < from {
        return 0;
    }
    let span_ms = (to - from).num_milliseconds();
    1 + (span_ms + DAY_MS - 1) / DAY_MS
}

/// Average grace per member, divided only once at nanosecond precision.
pub fn team_credit(total_days: i64, member_count: usize) -> Duration {
    if member_count == 0 || total_days <= 0 {
        return Duration::zero();
    }
    let members = i32::try_from(member_count).unwrap_or(i32::MAX);
    Duration::days(total_days) / members
}

/// Where vacation starts counting: the day after the last commit, or the lock
/// time for a repository that never received one.
pub fn evaluation_start(
    last_commit: Option<DateTime<Utc>>,
    locked_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match last_commit {
        Some(t) => Some(t + Duration::hours(24)),
        None => locked_at,
    }
}

// ---------------------------------------------------------------------------
// VacationSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VacationSource: Send + Sync {
    async fn windows(&self, login: &str) -> Result<Vec<VacationWindow>>;
}

#[derive(Debug, Deserialize)]
struct RawWindow {
    #[serde(alias = "start_time")]
    start_date: Option<String>,
    #[serde(alias = "end_time")]
    end_date: Option<String>,
}

fn parse_local_date(raw: &str, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| WatchError::BadDate(raw.to_string()))?;
    Ok(local_midnight(date, offset))
}

/// HTTP client for the staff portal's vacation endpoint.
pub struct PortalClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    offset: FixedOffset,
}

impl PortalClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        token: Option<String>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            token,
            offset,
        }
    }
}

#[async_trait]
impl VacationSource for PortalClient {
    async fn windows(&self, login: &str) -> Result<Vec<VacationWindow>> {
        let mut query = vec![("login", login)];
        if let Some(token) = &self.token {
            query.push(("token", token.as_str()));
        }
        let resp = self.http.get(&self.endpoint).query(&query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(WatchError::Http {
                service: "Portal",
                status: status.as_u16(),
                body,
            });
        }

        let raw: Vec<RawWindow> = serde_json::from_str(&body)?;
        let mut windows = Vec::with_capacity(raw.len());
        for w in raw {
            let (Some(start), Some(end)) = (w.start_date, w.end_date) else {
                tracing::warn!(login, "skipping open-ended vacation window");
                continue;
            };
            windows.push(VacationWindow {
                start: parse_local_date(&start, self.offset)?,
                end: parse_local_date(&end, self.offset)?,
            });
        }
        Ok(windows)
    }
}

// ---------------------------------------------------------------------------
// VacationLedger
// ---------------------------------------------------------------------------

pub struct VacationLedger<'a> {
    source: &'a dyn VacationSource,
}

impl<'a> VacationLedger<'a> {
    pub fn new(source: &'a dyn VacationSource) -> Self {
        Self { source }
    }

    /// Days of `[start, end]` covered by `login`'s vacations. A failed lookup
    /// counts as no vacation.
    pub async fn credit_for(&self, login: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        match self.source.windows(login).await {
            Ok(windows) => windows
                .iter()
                .map(|w| overlap_days(w.start, w.end, start, end))
                .sum(),
            Err(e) => {
                tracing::warn!(login, error = %e, "vacation lookup failed; counting zero days");
                0
            }
        }
    }

    /// Grace to subtract from `deadline` for `team`.
    pub async fn team_credit(
        &self,
        team: &Team,
        last_commit: Option<DateTime<Utc>>,
        deadline: DateTime<Utc>,
    ) -> Duration {
        let Some(start) = evaluation_start(last_commit, team.locked_at) else {
            return Duration::zero();
        };
        let mut days = 0;
        for member in &team.users {
            days += self.credit_for(&member.login, start, deadline).await;
        }
        let credit = team_credit(days, team.users.len());
        tracing::debug!(team = team.id, days, credit_hours = credit.num_hours(), "vacation credit");
        credit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
