//! Run-scoped lookup cache for directory records.
//!
//! Owned by whoever drives a run and passed down explicitly. Entries are never
//! invalidated while a run is in progress; call [`Cache::reset`] before reusing
//! it for another run.

use crate::directory::Directory;
use crate::error::Result;
use crate::types::{Project, Team};
use std::collections::HashMap;

pub const UNKNOWN_PROJECT: &str = "Unknown Project";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Project(u64),
    Team(u64),
}

#[derive(Debug, Clone)]
enum Cached {
    Project(Project),
    Team(Team),
}

#[derive(Debug, Default)]
pub struct Cache {
    entries: HashMap<CacheKey, Cached>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&self, id: u64) -> Option<&Project> {
        match self.entries.get(&CacheKey::Project(id)) {
            Some(Cached::Project(p)) => Some(p),
            _ => None,
        }
    }

    pub fn team(&self, id: u64) -> Option<&Team> {
        match self.entries.get(&CacheKey::Team(id)) {
            Some(Cached::Team(t)) => Some(t),
            _ => None,
        }
    }

    pub fn insert_project(&mut self, project: Project) {
        self.entries
            .insert(CacheKey::Project(project.id), Cached::Project(project));
    }

    pub fn insert_team(&mut self, team: Team) {
        self.entries.insert(CacheKey::Team(team.id), Cached::Team(team));
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Project record, fetched on first use.
    pub async fn load_project(&mut self, directory: &dyn Directory, id: u64) -> Result<Project> {
        if let Some(p) = self.project(id) {
            return Ok(p.clone());
        }
        let project = directory.project(id).await?;
        self.insert_project(project.clone());
        Ok(project)
    }

    /// Display name of a project; lookup failures degrade to a placeholder.
    pub async fn project_name(&mut self, directory: &dyn Directory, id: u64) -> String {
        match self.load_project(directory, id).await {
            Ok(p) => p.name,
            Err(e) => {
                tracing::warn!(project = id, error = %e, "project lookup failed");
                UNKNOWN_PROJECT.to_string()
            }
        }
    }

    /// Team record, fetched on first use.
    pub async fn load_team(&mut self, directory: &dyn Directory, id: u64) -> Result<Team> {
        if let Some(t) = self.team(id) {
            return Ok(t.clone());
        }
        let team = directory.team(id).await?;
        self.insert_team(team.clone());
        Ok(team)
    }
}
