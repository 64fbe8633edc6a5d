use crate::error::{Result, WatchError};
use crate::transport::RemoteExec;
use crate::types::{ActivityResult, Team};
use chrono::{DateTime, Utc};

/// git's default `Date:` rendering, e.g. `Tue Mar 5 14:03:11 2024 -0800`.
pub const GIT_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y %z";
const DATE_MARKER: &str = "Date:";

/// Path of the team repository on the host.
///
/// `repo_url` looks like `git@host:intra/2024/ft_ls_alice`. Its last segment
/// is whatever name the repository was advertised under; the canonical
/// `repo_uuid` replaces it when known.
pub fn remote_path(base_path: &str, repo_url: &str, repo_uuid: Option<&str>) -> Result<String> {
    let (_, path) = repo_url
        .split_once(':')
        .ok_or_else(|| WatchError::BadRepoAddress(repo_url.to_string()))?;
    let mut segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if segments.iter().all(|s| s.is_empty()) {
        return Err(WatchError::BadRepoAddress(repo_url.to_string()));
    }
    if let (Some(last), Some(uuid)) = (segments.last_mut(), repo_uuid) {
        *last = uuid;
    }
    let full = format!("{}/{}", base_path.trim_end_matches('/'), segments.join("/"));
    if full.contains('\'') {
        return Err(WatchError::BadRepoAddress(repo_url.to_string()));
    }
    Ok(full)
}

/// Shell command printing the first `Date:` line of the repository's log.
pub fn log_command(path: &str) -> String {
    format!("git -C '{path}' log -1 2>/dev/null | grep '{DATE_MARKER}' | head -n1")
}

/// Interpret probe output. No marker line means the repository is empty; a
/// marker line that fails to parse is an error, never an empty repository.
pub fn parse_log_output(output: &str) -> Result<ActivityResult> {
    for line in output.lines() {
        let Some(rest) = line.trim_start().strip_prefix(DATE_MARKER) else {
            continue;
        };
        let normalized = rest.split_whitespace().collect::<Vec<_>>().join(" ");
        let parsed = DateTime::parse_from_str(&normalized, GIT_DATE_FORMAT).map_err(|source| {
            WatchError::BadCommitDate {
                line: line.to_string(),
                source,
            }
        })?;
        return Ok(ActivityResult::Commit(parsed.with_timezone(&Utc)));
    }
    Ok(ActivityResult::Empty)
}

// ---------------------------------------------------------------------------
// ActivityProber
// ---------------------------------------------------------------------------

pub struct ActivityProber<'a> {
    exec: &'a dyn RemoteExec,
    base_path: &'a str,
}

impl<'a> ActivityProber<'a> {
    pub fn new(exec: &'a dyn RemoteExec, base_path: &'a str) -> Self {
        Self { exec, base_path }
    }

    pub async fn last_activity(&self, team: &Team) -> Result<ActivityResult> {
        let repo_url = team
            .repo_url
            .as_deref()
            .ok_or_else(|| WatchError::BadRepoAddress(String::new()))?;
        let path = remote_path(self.base_path, repo_url, team.repo_uuid.as_deref())?;
        tracing::debug!(team = team.id, %path, "probing repository");
        let output = self.exec.run(&log_command(&path)).await?;
        parse_log_output(&output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
