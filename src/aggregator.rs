//! Merging per-file scan results into one outcome

use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::patterns::MatchClass;
use crate::scanner::{FileScan, MatchRecord};
use crate::severity::{CheckOutcome, CheckState, Severity};
use std::path::Path;

pub const MESSAGE_OK: &str = "OK - No matches found.";

#[derive(Debug)]
pub struct OutcomeAggregator {
    warning_threshold: u32,
    critical_threshold: u32,
    nodiff: Option<Severity>,
    warnings: Vec<MatchRecord>,
    criticals: Vec<MatchRecord>,
    bytes_read: u64,
    failures: Vec<String>,
}

impl OutcomeAggregator {
    pub fn new(config: &CheckConfig) -> Self {
        let nodiff = if config.nodiff_crit {
            Some(Severity::Critical)
        } else if config.nodiff_warn {
            Some(Severity::Warning)
        } else {
            None
        };
        Self {
            warning_threshold: config.warning,
            critical_threshold: config.critical,
            nodiff,
            warnings: Vec::new(),
            criticals: Vec::new(),
            bytes_read: 0,
            failures: Vec::new(),
        }
    }

    /// Add the matches of one scanned file, in processing order
    pub fn accumulate(&mut self, scan: FileScan) {
        self.bytes_read += scan.bytes_read;
        for record in scan.matches {
            match record.class {
                MatchClass::Warning => self.warnings.push(record),
                MatchClass::Critical => self.criticals.push(record),
            }
        }
    }

    /// Note a file that could not be scanned
    ///
    /// Per-file errors already name their file.
    pub fn record_failure(&mut self, error: &CheckError) {
        self.failures.push(error.to_string());
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn critical_count(&self) -> usize {
        self.criticals.len()
    }

    pub fn outcome(&self) -> CheckOutcome {
        let critical_hit = reaches(self.criticals.len(), self.critical_threshold);
        let warning_hit = reaches(self.warnings.len(), self.warning_threshold);
        let stale = self.bytes_read == 0 && self.failures.is_empty();

        let severity = [
            critical_hit.then_some(Severity::Critical),
            warning_hit.then_some(Severity::Warning),
            self.nodiff.filter(|_| stale),
        ]
        .into_iter()
        .flatten()
        .fold(Severity::Ok, Severity::max);

        let message = match severity {
            Severity::Critical if critical_hit => format!(
                "CRITICAL: Critical Found {} lines: {}",
                self.criticals.len(),
                render_matches(&self.criticals)
            ),
            Severity::Warning if warning_hit => format!(
                "WARNING: Found {} lines (limit={}/{}): {}",
                self.warnings.len(),
                self.warning_threshold,
                self.critical_threshold,
                render_matches(&self.warnings)
            ),
            Severity::Ok => MESSAGE_OK.to_string(),
            nodiff => format!("{} - Log files are not updated.", nodiff.keyword()),
        };

        if self.failures.is_empty() {
            return CheckOutcome::new(CheckState::Graded(severity), message);
        }

        let failed = self.failures.join(",");
        if severity == Severity::Ok {
            CheckOutcome::unknown(format!("Failed to scan: {}", failed))
        } else {
            CheckOutcome::new(
                CheckState::Graded(severity),
                format!("{} / Failed to scan: {}", message, failed),
            )
        }
    }
}

/// A zero threshold is met by any single match; zero matches never are
fn reaches(count: usize, threshold: u32) -> bool {
    count > 0 && count >= threshold as usize
}

/// `text,text at path,text at path` grouping consecutive records per file
fn render_matches(records: &[MatchRecord]) -> String {
    let mut groups: Vec<(&Path, Vec<&str>)> = Vec::new();
    for record in records {
        match groups.last_mut() {
            Some((path, texts)) if *path == record.path.as_path() => texts.push(&record.text),
            _ => groups.push((record.path.as_path(), vec![record.text.as_str()])),
        }
    }
    groups
        .iter()
        .map(|(path, texts)| format!("{} at {}", texts.join(","), path.display()))
        .collect::<Vec<_>>()
        .join(",")
}
