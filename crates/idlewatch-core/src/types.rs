use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire format of every timestamp the directory service accepts.
pub const DIRECTORY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn format_directory_time(t: DateTime<Utc>) -> String {
    t.format(DIRECTORY_TIME_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Ok,
    Warned,
    Stagnant,
    Cheat,
}

impl Classification {
    pub fn all() -> &'static [Classification] {
        &[
            Classification::Ok,
            Classification::Warned,
            Classification::Stagnant,
            Classification::Cheat,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Ok => "OK",
            Classification::Warned => "WARNED",
            Classification::Stagnant => "STAGNANT",
            Classification::Cheat => "CHEAT",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Classification {
    type Err = crate::error::WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Classification::Ok),
            "WARNED" => Ok(Classification::Warned),
            "STAGNANT" => Ok(Classification::Stagnant),
            "CHEAT" => Ok(Classification::Cheat),
            _ => Err(crate::error::WatchError::InvalidConfig(format!(
                "unknown classification '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActivityResult
// ---------------------------------------------------------------------------

/// Outcome of reading a team repository's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityResult {
    /// Most recent commit, already normalized to UTC.
    Commit(DateTime<Utc>),
    /// The repository exists but has no commits yet.
    Empty,
}

impl ActivityResult {
    pub fn last_commit(self) -> Option<DateTime<Utc>> {
        match self {
            ActivityResult::Commit(t) => Some(t),
            ActivityResult::Empty => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Directory records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub project_id: u64,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub repo_uuid: Option<String>,
    #[serde(default)]
    pub users: Vec<Member>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub terminating_at: Option<DateTime<Utc>>,
}

impl Team {
    pub fn logins(&self) -> Vec<&str> {
        self.users.iter().map(|u| u.login.as_str()).collect()
    }

    /// Comma-joined member logins, as printed in reports.
    pub fn login_list(&self) -> String {
        self.logins().join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// An approved absence, both ends inclusive at date granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn classification_strings_are_stable() {
        for c in Classification::all() {
            let parsed: Classification = c.as_str().parse().unwrap();
            assert_eq!(parsed, *c);
        }
        assert_eq!(Classification::Stagnant.to_string(), "STAGNANT");
        assert!("dormant".parse::<Classification>().is_err());
    }

    #[test]
    fn team_deserializes_directory_payload() {
        let json = r#"{
            "id": 42,
            "name": "ft_ls-team",
            "project_id": 7,
            "repo_url": "git@vogsphere.example.org:intra/2024/activities/ft_ls_alice",
            "repo_uuid": "intra-uuid-1234",
            "users": [{"id": 1, "login": "alice"}, {"id": 2, "login": "bob"}],
            "status": "in_progress",
            "locked_at": "2024-01-02T09:30:00.000Z",
            "closed_at": null,
            "terminating_at": null
        }"#;
        let team: Team = serde_json::from_str(json).unwrap();
        assert_eq!(team.id, 42);
        assert_eq!(team.login_list(), "alice, bob");
        assert_eq!(
            team.locked_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap())
        );
        assert!(team.closed_at.is_none());
    }

    #[test]
    fn directory_time_has_millis_and_zulu() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(format_directory_time(t), "2024-03-05T00:00:00.000Z");
    }
}
