#![forbid(unsafe_code)]

use sl_core::ids::JobId;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    UnknownJob(JobId),
    JobAlreadyExists(JobId),
    ClaimMismatch {
        expected: String,
        stored: String,
    },
    Assertion {
        column: &'static str,
        actual: rusqlite::types::Type,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownJob(id) => write!(f, "unknown job {}", id.as_i64()),
            Self::JobAlreadyExists(id) => write!(f, "job {} already exists", id.as_i64()),
            Self::ClaimMismatch { expected, stored } => write!(
                f,
                "claim session mismatch (expected={expected}, stored={stored})"
            ),
            Self::Assertion { column, actual } => {
                write!(f, "job info: expected {column} to be a blob (was {actual})")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}
