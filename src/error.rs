//! Error type shared by the scheduler, the database layer and the review service.

use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("card not found: {0}")]
    NotFound(i64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transient persistence failure. Nothing was written; the caller may retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which side of the boundary an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Client,
    Server,
}

impl ReviewError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::InvalidArgument(_) => ErrorKind::Client,
            _ => ErrorKind::Server,
        }
    }
}

impl From<rusqlite::Error> for ReviewError {
    fn from(err: rusqlite::Error) -> Self {
        // Busy/locked means another writer held the database past busy_timeout.
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                Self::StorageUnavailable(err.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
