use crate::cache::Cache;
use crate::config::Config;
use crate::context::EvaluationContext;
use crate::directory::{Directory, TeamQuery};
use crate::error::Result;
use crate::types::Team;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Whether `repo_url` is hosted on `domain` or one of its subdomains.
///
/// The host is whatever sits between an optional `user@` and the first `:`
/// or `/`, so both `git@host:path` and `ssh://host/path` forms are read.
pub fn repo_in_domain(repo_url: &str, domain: &str) -> bool {
    let rest = repo_url.split_once("://").map_or(repo_url, |(_, r)| r);
    let rest = rest.split_once('@').map_or(rest, |(_, r)| r);
    let host = rest.split([':', '/']).next().unwrap_or_default();
    let domain = domain.trim_start_matches('.');
    if host.is_empty() || domain.is_empty() {
        return false;
    }
    host.eq_ignore_ascii_case(domain)
        || host
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
}

/// Everything the selector needs from config and the run's context.
#[derive(Debug, Clone)]
pub struct SelectionCriteria {
    pub campus: u64,
    pub tracks: Vec<u64>,
    pub whitelist: Vec<u64>,
    pub repo_domain: String,
    pub created_from: DateTime<Utc>,
    pub created_until: DateTime<Utc>,
    pub page_size: u32,
}

impl SelectionCriteria {
    pub fn new(config: &Config, ctx: &EvaluationContext) -> Self {
        Self {
            campus: config.campus.id,
            tracks: config.selection.tracks.clone(),
            whitelist: config.selection.project_whitelist.clone(),
            repo_domain: config.selection.repo_domain.clone(),
            created_from: config.selection.start_date,
            created_until: ctx.look_ahead(),
            page_size: config.directory.page_size,
        }
    }

    fn query(&self, track: u64) -> TeamQuery {
        TeamQuery {
            campus: self.campus,
            track,
            created_from: self.created_from,
            created_until: self.created_until,
            page_size: self.page_size,
        }
    }

    fn accepts(&self, team: &Team) -> bool {
        if !self.whitelist.contains(&team.project_id) {
            return false;
        }
        team.repo_url
            .as_deref()
            .is_some_and(|url| repo_in_domain(url, &self.repo_domain))
    }
}

/// Candidate teams across every track, de-duplicated in first-seen order.
///
/// A failing track query fails the whole selection. Selected teams are
/// recorded in `cache` so later lookups by id skip the directory.
pub async fn select(
    directory: &dyn Directory,
    cache: &mut Cache,
    criteria: &SelectionCriteria,
) -> Result<Vec<Team>> {
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for &track in &criteria.tracks {
        let teams = directory.teams(&criteria.query(track)).await?;
        let fetched = teams.len();
        let mut kept = 0usize;
        for team in teams {
            if !criteria.accepts(&team) || !seen.insert(team.id) {
                continue;
            }
            kept += 1;
            cache.insert_team(team.clone());
            selected.push(team);
        }
        tracing::debug!(track, fetched, kept, "track selected");
    }

    tracing::info!(count = selected.len(), "teams selected");
    Ok(selected)
}
