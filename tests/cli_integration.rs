//! CLI integration tests
//!
//! Run the binary the way a monitoring scheduler would and check the plugin
//! line and exit code.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn log(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn seek_dir(&self) -> PathBuf {
        self.dir.path().join("seek")
    }

    /// Command with the seek directory pointed into the temp dir
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("logsentry").expect("Failed to find logsentry binary");
        cmd.arg("-S").arg(self.seek_dir());
        cmd
    }
}

fn append(path: &Path, line: &str) {
    let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
    writeln!(file, "{}", line).unwrap();
}

// ============================================================================
// Severity Tests
// ============================================================================

#[test]
fn test_ok_when_nothing_matches() {
    let env = Env::new();
    let log = env.log("messages");
    append(&log, "Dec  5 12:34:50 hostname test: all good");

    env.cmd()
        .arg("-l")
        .arg(&log)
        .args(["-p", "ERROR"])
        .assert()
        .code(0)
        .stdout("OK - No matches found.\n");
}

#[test]
fn test_warning_then_ok() {
    let env = Env::new();
    let log = env.log("messages");
    append(&log, "Dec  5 12:34:50 hostname test: ERROR");

    env.cmd()
        .arg("-l")
        .arg(&log)
        .args(["-p", "ERROR"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with(
            "WARNING: Found 1 lines (limit=1/0): Dec  5 12:34:50 hostname test: ERROR at ",
        ));

    env.cmd()
        .arg("-l")
        .arg(&log)
        .args(["-p", "ERROR"])
        .assert()
        .code(0)
        .stdout(predicate::str::starts_with("OK"));
}

#[test]
fn test_critical_exit_code() {
    let env = Env::new();
    let log = env.log("messages");
    append(&log, "Dec  5 12:34:50 hostname test: FATAL disk gone");

    env.cmd()
        .arg("-l")
        .arg(&log)
        .args(["-p", "ERROR", "--critical-pattern", "FATAL"])
        .assert()
        .code(2)
        .stdout(predicate::str::starts_with("CRITICAL: Critical Found 1 lines: "));
}

#[test]
fn test_pipe_never_reaches_output() {
    let env = Env::new();
    let log = env.log("messages");
    append(&log, "Dec  5 12:34:50 hostname test: ERROR a|b");

    env.cmd()
        .arg("-l")
        .arg(&log)
        .args(["-p", "ERROR"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("a(pipe)b"))
        .stdout(predicate::str::contains("|").not());
}

#[test]
fn test_pattern_file() {
    let env = Env::new();
    let log = env.log("messages");
    let patterns = env.log("patterns.txt");
    fs::write(&patterns, "# watched\nsegfault\n").unwrap();
    append(&log, "Dec  5 12:34:50 hostname kernel: app segfault at 0");

    env.cmd()
        .arg("-l")
        .arg(&log)
        .arg("-P")
        .arg(&patterns)
        .assert()
        .code(1);
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_bad_arguments_are_unknown() {
    let env = Env::new();

    env.cmd()
        .args(["-l", "x.log", "-p", "ERROR", "--no-such-flag"])
        .assert()
        .code(3)
        .stdout(predicate::str::starts_with("UNKNOWN: "));
}

#[test]
fn test_missing_pattern_is_unknown() {
    let env = Env::new();

    env.cmd()
        .args(["-l", "x.log"])
        .assert()
        .code(3)
        .stdout(predicate::str::starts_with("UNKNOWN: Invalid configuration"));
}

#[test]
fn test_invalid_regex_is_unknown() {
    let env = Env::new();

    env.cmd()
        .args(["-l", "x.log", "-p", "(unclosed"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Invalid pattern"));
}

#[test]
fn test_help_exits_zero() {
    Command::cargo_bin("logsentry")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--logfile"));
}

#[test]
fn test_logs_go_to_stderr() {
    let env = Env::new();
    let log = env.log("messages");
    append(&log, "Dec  5 12:34:50 hostname test: ERROR");

    let output = env
        .cmd()
        .arg("-l")
        .arg(&log)
        .args(["-p", "ERROR", "-vv"])
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.starts_with("WARNING"));
}
