use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("team not found: {0}")]
    TeamNotFound(u64),

    #[error("project not found: {0}")]
    ProjectNotFound(u64),

    #[error("team {0} has no members")]
    NoMembers(u64),

    #[error("malformed repository address '{0}': expected user@host:path")]
    BadRepoAddress(String),

    #[error("unparsable commit date '{line}': {source}")]
    BadCommitDate {
        line: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid date '{0}'")]
    BadDate(String),

    #[error("{service} error [Response: {status}] {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote command failed: {0}")]
    RemoteCommand(String),

    #[error("remote command timed out after {0}s")]
    Timeout(u64),

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;
