//! Member notices: composition from templates and delivery.
//!
//! A notice is a complete RFC 5322 message (headers, blank line, HTML body)
//! with CRLF line endings, addressed to every member of a team.

use crate::config::Config;
use crate::context::EvaluationContext;
use crate::error::{Result, WatchError};
use crate::types::Team;
use askama::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Prelaunch,
    Warning,
    Closed,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeKind::Prelaunch => "prelaunch",
            NoticeKind::Warning => "warning",
            NoticeKind::Closed => "closed",
        }
    }

    pub fn title(self, project_name: &str) -> String {
        match self {
            NoticeKind::Warning => format!("{project_name} Nearing Update Deadline"),
            NoticeKind::Prelaunch | NoticeKind::Closed => {
                format!("Insufficient Progress on {project_name}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub team_id: u64,
    pub recipients: Vec<String>,
    pub subject: String,
    /// Full message as handed to the mail transport.
    pub message: String,
}

/// "N days ago" since `last`, or "never" for a repository without commits.
pub fn time_elapsed(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match last {
        Some(t) => format!("{} days ago", (now - t).num_days()),
        None => "never".to_string(),
    }
}

fn crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

struct NoticeFields {
    from: String,
    to: String,
    title: String,
    project_name: String,
    last_commit_date: String,
    time_elapsed: String,
    days_until_stagnant: i64,
    days_to_correct: i64,
}

#[derive(Template)]
#[template(path = "prelaunch.html")]
struct PrelaunchNotice<'a> {
    n: &'a NoticeFields,
}

#[derive(Template)]
#[template(path = "warning.html")]
struct WarningNotice<'a> {
    n: &'a NoticeFields,
}

#[derive(Template)]
#[template(path = "closed.html")]
struct ClosedNotice<'a> {
    n: &'a NoticeFields,
}

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

pub struct Composer<'a> {
    from: &'a str,
    mail_domain: &'a str,
    ctx: &'a EvaluationContext,
}

impl<'a> Composer<'a> {
    pub fn new(config: &'a Config, ctx: &'a EvaluationContext) -> Self {
        Self {
            from: &config.mail.from,
            mail_domain: &config.campus.mail_domain,
            ctx,
        }
    }

    pub fn address(&self, login: &str) -> String {
        format!("{login}@{}", self.mail_domain)
    }

    pub fn compose(
        &self,
        kind: NoticeKind,
        team: &Team,
        project_name: &str,
        last_commit: Option<DateTime<Utc>>,
    ) -> Result<Notice> {
        if team.users.is_empty() {
            return Err(WatchError::NoMembers(team.id));
        }
        let recipients: Vec<String> = team.logins().into_iter().map(|l| self.address(l)).collect();
        let subject = kind.title(project_name);
        let fields = NoticeFields {
            from: self.from.to_string(),
            to: recipients.join(", "),
            title: subject.clone(),
            project_name: project_name.to_string(),
            last_commit_date: last_commit.map_or_else(
                || "NEVER".to_string(),
                |t| {
                    t.with_timezone(&self.ctx.offset)
                        .format("%Y-%m-%d %H:%M:%S %:z")
                        .to_string()
                },
            ),
            time_elapsed: time_elapsed(last_commit, self.ctx.now),
            days_until_stagnant: self.ctx.days_until_stagnant,
            days_to_correct: self.ctx.days_to_correct,
        };
        let rendered = match kind {
            NoticeKind::Prelaunch => PrelaunchNotice { n: &fields }.render()?,
            NoticeKind::Warning => WarningNotice { n: &fields }.render()?,
            NoticeKind::Closed => ClosedNotice { n: &fields }.render()?,
        };
        Ok(Notice {
            kind,
            team_id: team.id,
            recipients,
            subject,
            message: crlf(&rendered),
        })
    }
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notice: &Notice) -> Result<()>;
}

/// Delivers through the local `sendmail` interface, message on stdin.
pub struct Sendmail {
    program: String,
    from: String,
}

impl Sendmail {
    pub fn new(program: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for Sendmail {
    async fn send(&self, notice: &Notice) -> Result<()> {
        let program = which::which(&self.program)
            .map_err(|e| WatchError::Mail(format!("{} not found: {e}", self.program)))?;
        let mut child = Command::new(program)
            .args(["-i", "-f", self.from.as_str(), "--"])
            .args(&notice.recipients)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(notice.message.as_bytes()).await?;
            stdin.flush().await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(WatchError::Mail(format!(
                "{} exited with {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        tracing::debug!(
            team = notice.team_id,
            kind = notice.kind.as_str(),
            recipients = notice.recipients.len(),
            "notice delivered"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
