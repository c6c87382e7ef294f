//! Check states and the outcome returned to the scheduler

use serde::{Deserialize, Serialize};
use std::fmt;

/// Graded result of a successful scan, ordered by rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

impl Severity {
    pub fn keyword(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Reported state: a graded severity, or UNKNOWN when no reliable result exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckState {
    Graded(Severity),
    Unknown,
}

impl CheckState {
    pub const OK: CheckState = CheckState::Graded(Severity::Ok);
    pub const WARNING: CheckState = CheckState::Graded(Severity::Warning);
    pub const CRITICAL: CheckState = CheckState::Graded(Severity::Critical);

    pub fn keyword(self) -> &'static str {
        match self {
            CheckState::Graded(severity) => severity.keyword(),
            CheckState::Unknown => "UNKNOWN",
        }
    }

    /// Plugin exit code consumed by the scheduler.
    pub fn exit_code(self) -> i32 {
        match self {
            CheckState::Graded(Severity::Ok) => 0,
            CheckState::Graded(Severity::Warning) => 1,
            CheckState::Graded(Severity::Critical) => 2,
            CheckState::Unknown => 3,
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// State plus the fully rendered message line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub state: CheckState,
    pub message: String,
}

impl CheckOutcome {
    pub fn new(state: CheckState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }

    pub fn unknown(detail: impl fmt::Display) -> Self {
        Self::new(CheckState::Unknown, format!("UNKNOWN: {}", detail))
    }
}
