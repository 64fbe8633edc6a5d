use crate::error::{Result, WatchError};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "idlewatch.yaml";

/// Upper bound for every day-count policy setting.
pub const MAX_POLICY_DAYS: i64 = 3650;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// CampusConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampusConfig {
    pub id: u64,
    /// Member addresses are `<login>@<mail_domain>`.
    pub mail_domain: String,
    /// Offset used to read local dates such as vacation days and the run's
    /// midnight, e.g. "-07:00". Falls back to the host's offset.
    #[serde(default)]
    pub utc_offset: Option<String>,
}

impl CampusConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        match &self.utc_offset {
            Some(raw) => raw
                .parse::<FixedOffset>()
                .map_err(|_| WatchError::InvalidConfig(format!("bad utc_offset '{raw}'"))),
            None => Ok(Local::now().offset().fix()),
        }
    }
}

// ---------------------------------------------------------------------------
// SelectionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Curriculum track ids; one directory query is issued per track.
    pub tracks: Vec<u64>,
    pub project_whitelist: Vec<u64>,
    /// Lower bound of the lock-time range.
    pub start_date: DateTime<Utc>,
    /// Host the institution's repositories live on.
    pub repo_domain: String,
}

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_days_until_stagnant")]
    pub days_until_stagnant: i64,
    #[serde(default = "default_days_to_correct")]
    pub days_to_correct: i64,
    #[serde(default = "default_vacation_credit")]
    pub vacation_credit: bool,
    /// Before this date stagnant teams only get an advance notice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_date: Option<NaiveDate>,
}

fn default_days_until_stagnant() -> i64 {
    14
}

fn default_days_to_correct() -> i64 {
    7
}

fn default_vacation_credit() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            days_until_stagnant: default_days_until_stagnant(),
            days_to_correct: default_days_to_correct(),
            vacation_credit: default_vacation_credit(),
            launch_date: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DirectoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_directory_url")]
    pub base_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_directory_url() -> String {
    "https://api.intra.42.fr/v2/".to_string()
}

fn default_token_url() -> String {
    "https://api.intra.42.fr/oauth/token".to_string()
}

fn default_page_size() -> u32 {
    100
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_directory_url(),
            token_url: default_token_url(),
            page_size: default_page_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// VacationsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacationsConfig {
    pub endpoint: String,
}

// ---------------------------------------------------------------------------
// RepositoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    pub private_key_path: String,
    /// Directory on the host under which repository paths are resolved.
    pub base_path: String,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_command_timeout() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// MailConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from: String,
    #[serde(default = "default_sendmail")]
    pub sendmail: String,
}

fn default_sendmail() -> String {
    "sendmail".to_string()
}

// ---------------------------------------------------------------------------
// SummaryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Chat channel the run report is uploaded to; `None` keeps it local.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default = "default_chat_api")]
    pub api_url: String,
}

fn default_chat_api() -> String {
    "https://slack.com/api/files.upload".to_string()
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            channel: None,
            api_url: default_chat_api(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub campus: CampusConfig,
    pub selection: SelectionConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    pub vacations: VacationsConfig,
    pub repository: RepositoryConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WatchError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.selection.tracks.is_empty() {
            warnings.push(ConfigWarning::error(
                "selection.tracks is empty: no team would ever be selected",
            ));
        }
        if self.selection.project_whitelist.is_empty() {
            warnings.push(ConfigWarning::error(
                "selection.project_whitelist is empty: every team would be filtered out",
            ));
        }
        if self.selection.repo_domain.trim().is_empty() {
            warnings.push(ConfigWarning::error("selection.repo_domain is empty"));
        }

        if self.policy.days_until_stagnant <= 0 {
            warnings.push(ConfigWarning::error(format!(
                "policy.days_until_stagnant={} must be positive",
                self.policy.days_until_stagnant
            )));
        }
        if self.policy.days_to_correct < 0 {
            warnings.push(ConfigWarning::error(format!(
                "policy.days_to_correct={} must not be negative",
                self.policy.days_to_correct
            )));
        }
        for (name, days) in [
            ("days_until_stagnant", self.policy.days_until_stagnant),
            ("days_to_correct", self.policy.days_to_correct),
        ] {
            if days > MAX_POLICY_DAYS {
                warnings.push(ConfigWarning::error(format!(
                    "policy.{name}={days} exceeds {MAX_POLICY_DAYS} days"
                )));
            }
        }

        if self.campus.offset().is_err() {
            warnings.push(ConfigWarning::error(format!(
                "campus.utc_offset '{}' is not of the form +HH:MM",
                self.campus.utc_offset.as_deref().unwrap_or_default()
            )));
        }

        if self.directory.page_size == 0 || self.directory.page_size > 100 {
            warnings.push(ConfigWarning::warning(format!(
                "directory.page_size={} is outside 1..=100",
                self.directory.page_size
            )));
        }

        if self.repository.command_timeout_secs == 0 {
            warnings.push(ConfigWarning::warning(
                "repository.command_timeout_secs=0: every probe will time out",
            ));
        }

        if self.summary.channel.is_some() && std::env::var(CHAT_TOKEN_ENV).is_err() {
            warnings.push(ConfigWarning::warning(format!(
                "summary.channel is set but {CHAT_TOKEN_ENV} is not: the report will not be published"
            )));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

pub const CLIENT_ID_ENV: &str = "DIRECTORY_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "DIRECTORY_CLIENT_SECRET";
pub const VACATIONS_TOKEN_ENV: &str = "VACATIONS_TOKEN";
pub const CHAT_TOKEN_ENV: &str = "CHAT_TOKEN";

/// Credentials read from the environment, never from the config file.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub client_id: String,
    pub client_secret: String,
    pub vacations_token: Option<String>,
    pub chat_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        let required = |name: &'static str| {
            std::env::var(name).map_err(|_| WatchError::MissingEnv(name))
        };
        Ok(Self {
            client_id: required(CLIENT_ID_ENV)?,
            client_secret: required(CLIENT_SECRET_ENV)?,
            vacations_token: std::env::var(VACATIONS_TOKEN_ENV).ok(),
            chat_token: std::env::var(CHAT_TOKEN_ENV).ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
