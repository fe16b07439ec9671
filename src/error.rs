//! WolfRepl Error Types

use serde::Serialize;
use thiserror::Error;

/// Result type alias for WolfRepl operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfRepl error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Query failed '{sql}': {reason}")]
    QueryFailed { sql: String, reason: String },

    // Replication errors
    #[error("Unable to connect to master {host}: {reason}")]
    ConnectFailed { host: String, reason: String },

    #[error("Unable to read master log position: {0}")]
    PositionUnreadable(String),

    #[error("Unable to change master: {0}")]
    ChangeMasterFailed(String),

    #[error("Operation disabled by configuration: {0}")]
    Disabled(String),

    // Request errors
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of errors, used for HTTP status codes and messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Query,
    Connection,
    PositionUnreadable,
    ChangeMaster,
    Disabled,
    InvalidParameter,
    Config,
    Internal,
}

impl ErrorKind {
    /// Machine-readable code for API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Query => "QUERY_FAILED",
            ErrorKind::Connection => "CONNECT_FAILED",
            ErrorKind::PositionUnreadable => "POSITION_UNREADABLE",
            ErrorKind::ChangeMaster => "CHANGE_MASTER_FAILED",
            ErrorKind::Disabled => "DISABLED",
            ErrorKind::InvalidParameter => "INVALID_PARAMETER",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::ConfigParse(_) => ErrorKind::Config,
            Error::Database(_) | Error::QueryFailed { .. } => ErrorKind::Query,
            Error::ConnectFailed { .. } => ErrorKind::Connection,
            Error::PositionUnreadable(_) => ErrorKind::PositionUnreadable,
            Error::ChangeMasterFailed(_) => ErrorKind::ChangeMaster,
            Error::Disabled(_) => ErrorKind::Disabled,
            Error::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Error::Io(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is retryable
    ///
    /// Nothing retries automatically; this only tells the caller whether
    /// re-submitting the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ConnectFailed { .. } => true,
            Error::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }

    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
