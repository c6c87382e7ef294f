//! logsentry library crate
//!
//! Incremental, rotation-aware log file checks for pull-based monitoring.
//! The binary is a thin wrapper around [`checker::LogChecker`].

pub mod aggregator;
pub mod cache;
pub mod checker;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod logformat;
pub mod output;
pub mod patterns;
pub mod resolver;
pub mod scanner;
pub mod seek;
pub mod severity;

pub use checker::{CheckRequest, LogChecker, SeekLocation};
pub use config::CheckConfig;
pub use error::{CheckError, CheckResult};
pub use severity::{CheckOutcome, CheckState, Severity};
