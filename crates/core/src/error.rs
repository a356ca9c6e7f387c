use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Recognition failed: {0}")]
    Recognition(String),
    #[error("Cache store corrupt: {0}")]
    CacheCorrupt(String),
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io { path: path.into(), source }
    }

    /// Maps an IO error on `path` to `NotFound` when that is what it is.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ScanError::NotFound(path)
        } else {
            ScanError::Io { path, source }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::NotFound(_) => ErrorKind::NotFound,
            ScanError::Io { .. } => ErrorKind::Io,
            ScanError::Recognition(_) => ErrorKind::Recognition,
            ScanError::CacheCorrupt(_) => ErrorKind::CacheCorrupt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Io,
    Recognition,
    CacheCorrupt,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Recognition => write!(f, "recognition"),
            ErrorKind::CacheCorrupt => write!(f, "cache_corrupt"),
        }
    }
}

/// A failure rendered as plain data, for embedding in exported reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ScanError> for FailureReport {
    fn from(e: &ScanError) -> Self {
        FailureReport { kind: e.kind(), message: e.to_string() }
    }
}
