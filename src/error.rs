//! Error taxonomy for a single check invocation.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type CheckResult<T> = Result<T, CheckError>;

#[derive(Debug, Error)]
pub enum CheckError {
    /// Another process kept the run lock for longer than `lock_timeout`.
    #[error("Lock timeout. Another process is running.")]
    LockTimeout,

    #[error("State directory {path} is not usable: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt state file {path}: {source}")]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not valid {encoding}")]
    Decode { path: PathBuf, encoding: &'static str },

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid log format '{format}': {reason}")]
    LogFormat { format: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CheckError {
    /// Per-file errors are isolated to that file; everything else aborts the run.
    pub fn is_per_file(&self) -> bool {
        matches!(self, CheckError::Read { .. } | CheckError::Decode { .. })
    }

    pub(crate) fn state_dir(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CheckError::StateDir {
            path: path.into(),
            source,
        }
    }
}
