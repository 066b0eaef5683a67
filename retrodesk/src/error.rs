use std::path::PathBuf;
use thiserror::Error;

/// Rejected session commands. The state machine is left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("select a task before starting a focus session")]
    NoTaskSelected,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not determine data directory")]
    NoDataDir,
}

#[derive(Debug, Error)]
pub enum TaskApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("task api error: http {status}; body={body}")]
    Http { status: u16, body: String },
    #[error("invalid task payload: {0}")]
    Payload(String),
    #[error("invalid task api url: {0}")]
    Url(String),
    #[error("task {0} not found")]
    NotFound(u64),
    #[error("task text must not be empty")]
    EmptyText,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeskError {
    #[error("unknown app type: {0}")]
    UnknownApp(String),
    #[error("no open window for {0}")]
    NoWindow(String),
    #[error("content for {app} failed: {reason}")]
    Content { app: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
