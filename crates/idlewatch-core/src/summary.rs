//! Per-run report: one row per team, aggregate counts, optional chat upload.

use crate::dispatcher::Action;
use crate::error::{Result, WatchError};
use crate::types::{Classification, Team};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Classified(Classification),
    /// The team could not be classified or acted on.
    Error(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Classified(c) => c.as_str(),
            Outcome::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub team_id: u64,
    pub project: String,
    pub logins: String,
    pub outcome: Outcome,
    pub last_update: Option<DateTime<Utc>>,
    pub effective_deadline: Option<DateTime<Utc>>,
    pub action: Option<Action>,
    /// Set when the planned action or its notice failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportRow {
    pub fn new(team: &Team, project: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            team_id: team.id,
            project: project.into(),
            logins: team.login_list(),
            outcome,
            last_update: None,
            effective_deadline: None,
            action: None,
            error: None,
        }
    }

    fn cells(&self) -> Vec<String> {
        let time = |t: Option<DateTime<Utc>>| {
            t.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
        };
        vec![
            self.team_id.to_string(),
            self.project.clone(),
            self.logins.clone(),
            self.outcome.label().to_string(),
            match (&self.outcome, self.last_update) {
                (Outcome::Classified(_), None) => "never".to_string(),
                (_, t) => time(t),
            },
            time(self.effective_deadline),
            self.action.map_or_else(|| "-".to_string(), |a| a.to_string()),
            self.error.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

pub const REPORT_HEADERS: [&str; 8] = [
    "TEAM ID",
    "PROJECT",
    "LOGINS",
    "STATUS",
    "LAST COMMIT",
    "DEADLINE",
    "ACTION",
    "ERROR",
];

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: &'static str,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub dry_run: bool,
    pub rows: Vec<ReportRow>,
}

impl RunReport {
    pub fn new(run_date: NaiveDate, dry_run: bool) -> Self {
        Self {
            run_date,
            dry_run,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn title(&self) -> String {
        format!("Report {}", self.run_date)
    }

    /// Count and share of every status, errors last. Statuses that never
    /// occurred are listed with zero.
    pub fn counts(&self) -> Vec<StatusCount> {
        let total = self.rows.len();
        let labels = Classification::all()
            .iter()
            .map(|c| c.as_str())
            .chain(std::iter::once("error"));
        labels
            .map(|status| {
                let count = self
                    .rows
                    .iter()
                    .filter(|r| r.outcome.label() == status)
                    .count();
                let percent = if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                };
                StatusCount {
                    status,
                    count,
                    percent,
                }
            })
            .collect()
    }

    /// Rows whose close or notice did not go through.
    pub fn failed_actions(&self) -> usize {
        self.rows.iter().filter(|r| r.error.is_some()).count()
    }

    pub fn table_rows(&self) -> Vec<Vec<String>> {
        self.rows.iter().map(ReportRow::cells).collect()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Teams checked: {}", self.rows.len())];
        lines.extend(
            self.counts()
                .iter()
                .map(|c| format!("{}: {} ({:.1}%)", c.status, c.count, c.percent)),
        );
        lines.push(format!("Failed actions: {}", self.failed_actions()));
        lines
    }

    /// Table plus summary, as uploaded to the chat channel.
    pub fn render(&self) -> String {
        let mut out = format_table(&REPORT_HEADERS, &self.table_rows());
        out.push('\n');
        for line in self.summary_lines() {
            out.push('\n');
            out.push_str(&line);
        }
        out
    }
}

/// Left-aligned columns separated by two spaces, with a dashed rule under
/// the header. No trailing newline.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<String>| cells.join("  ").trim_end().to_string();
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(line(
        headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
            .collect(),
    ));
    lines.push(line(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in rows {
        lines.push(line(
            row.iter()
                .enumerate()
                .map(|(i, cell)| {
                    let w = widths.get(i).copied().unwrap_or(0);
                    format!("{:width$}", cell, width = w)
                })
                .collect(),
        ));
    }
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct UploadResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Upload the rendered report as a file to `channel`.
pub async fn publish(
    http: &reqwest::Client,
    api_url: &str,
    token: &str,
    channel: &str,
    report: &RunReport,
) -> Result<()> {
    let form = [
        ("token", token.to_string()),
        ("channels", channel.to_string()),
        ("content", report.render()),
        ("title", report.title()),
    ];
    let resp = http.post(api_url).form(&form).send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(WatchError::Http {
            service: "Chat",
            status: status.as_u16(),
            body,
        });
    }
    let parsed: UploadResponse = serde_json::from_str(&body)?;
    if !parsed.ok {
        return Err(WatchError::Http {
            service: "Chat",
            status: status.as_u16(),
            body: parsed.error.unwrap_or(body),
        });
    }
    tracing::info!(channel, title = %report.title(), "report published");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
