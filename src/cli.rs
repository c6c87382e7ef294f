use anyhow::Result;
use clap::{ArgAction, Parser};
use directories::ProjectDirs;
use std::env;
use std::path::PathBuf;

use crate::checker::{CheckRequest, LogChecker};
use crate::config::{read_pattern_file, CheckConfig, CliOverrides};
use crate::severity::CheckOutcome;

#[derive(Parser, Debug)]
#[command(name = "logsentry")]
#[command(version)]
#[command(about = "Incremental log file check for Nagios-style monitoring")]
#[command(long_about = "logsentry scans only the lines appended to log files since its last run \
    and reports OK, WARNING, CRITICAL or UNKNOWN with the matching lines.\n\n\
    Examples:\n  \
    logsentry -l /var/log/messages -p ERROR              # Warn on new ERROR lines\n  \
    logsentry -l '/var/log/app*.log' -p ERROR -I -R      # Follow rotation, purge old state\n  \
    logsentry -l /var/log/app.log --critical-pattern FATAL -c 1\n  \
    logsentry -l /var/log/app.log -p ERROR --cache --cachetime 30")]
pub struct Cli {
    /// Log file path or glob pattern (repeatable; a value may hold several separated by spaces)
    #[arg(short = 'l', long = "logfile", value_name = "PATH", required = true)]
    pub logfiles: Vec<String>,

    /// Explicit seek file for a single log file
    #[arg(short = 's', long, value_name = "FILE", conflicts_with = "seekfile_directory")]
    pub seekfile: Option<PathBuf>,

    /// Directory for seek, cache and lock files [default: user cache directory]
    #[arg(short = 'S', long, value_name = "DIR")]
    pub seekfile_directory: Option<PathBuf>,

    /// Tag that keeps the state of independent checks on the same files apart
    #[arg(short = 'T', long, value_name = "TAG")]
    pub seekfile_tag: Option<String>,

    /// Follow rotated files by inode instead of by path
    #[arg(short = 'I', long)]
    pub trace_inode: bool,

    /// Warning pattern (repeatable)
    #[arg(short = 'p', long = "pattern", value_name = "REGEX")]
    pub patterns: Vec<String>,

    /// File of warning patterns, one per line
    #[arg(short = 'P', long = "patternfile", value_name = "FILE")]
    pub pattern_files: Vec<PathBuf>,

    /// Pattern that excludes a line from warnings (repeatable)
    #[arg(short = 'n', long = "negpattern", value_name = "REGEX")]
    pub negpatterns: Vec<String>,

    /// File of warning exclusion patterns, one per line
    #[arg(short = 'N', long = "negpatternfile", value_name = "FILE")]
    pub negpattern_files: Vec<PathBuf>,

    /// Critical pattern (repeatable)
    #[arg(long = "critical-pattern", value_name = "REGEX")]
    pub critical_patterns: Vec<String>,

    /// File of critical patterns, one per line
    #[arg(long = "critical-patternfile", value_name = "FILE")]
    pub critical_pattern_files: Vec<PathBuf>,

    /// Pattern that excludes a line from both severities (repeatable)
    #[arg(long = "critical-negpattern", value_name = "REGEX")]
    pub critical_negpatterns: Vec<String>,

    /// File of critical exclusion patterns, one per line
    #[arg(long = "critical-negpatternfile", value_name = "FILE")]
    pub critical_negpattern_files: Vec<PathBuf>,

    /// Match all patterns case-insensitively
    #[arg(short = 'i', long)]
    pub case_insensitive: bool,

    /// Encoding of the log files [default: utf-8]
    #[arg(long, value_name = "ENCODING")]
    pub encoding: Option<String>,

    /// Warning match count threshold [default: 1]
    #[arg(short = 'w', long, value_name = "COUNT")]
    pub warning: Option<u32>,

    /// Critical match count threshold [default: 0]
    #[arg(short = 'c', long, value_name = "COUNT")]
    pub critical: Option<u32>,

    /// Report WARNING when no new data was written
    #[arg(long)]
    pub nodiff_warn: bool,

    /// Report CRITICAL when no new data was written
    #[arg(long)]
    pub nodiff_crit: bool,

    /// Record-start format for multiline mode [default: syslog]
    #[arg(short = 'F', long = "format", value_name = "FORMAT")]
    pub format: Option<String>,

    /// Join continuation lines into one record before matching
    #[arg(short = 'M', long)]
    pub multiline: bool,

    /// Skip files not modified within this many seconds [default: 86400]
    #[arg(short = 't', long, value_name = "SECONDS")]
    pub scantime: Option<u64>,

    /// Age in seconds after which orphaned seek files may be removed [default: 691200]
    #[arg(short = 'E', long, value_name = "SECONDS")]
    pub expiration: Option<u64>,

    /// Remove expired seek files of log files that are gone
    #[arg(short = 'R', long)]
    pub remove_seekfile: bool,

    /// Replay the last outcome instead of rescanning within --cachetime
    #[arg(long)]
    pub cache: bool,

    /// Seconds a cached outcome stays valid [default: 60]
    #[arg(long, value_name = "SECONDS")]
    pub cachetime: Option<u64>,

    /// Seconds to wait for a concurrent run to finish [default: 3]
    #[arg(long, value_name = "SECONDS")]
    pub lock_timeout: Option<u64>,

    /// TOML file with defaults for any option
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity on stderr (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Run the check; configuration problems are reported as UNKNOWN
    pub fn run(&self) -> CheckOutcome {
        match self.prepare() {
            Ok((checker, request)) => checker.check(&request),
            Err(e) => {
                tracing::error!("{:#}", e);
                CheckOutcome::unknown(format!("{:#}", e))
            }
        }
    }

    fn prepare(&self) -> Result<(LogChecker, CheckRequest)> {
        let config = self.build_config()?;
        let checker = LogChecker::new(config)?;
        Ok((checker, self.build_request()))
    }

    /// Config file values overridden by command line flags
    pub fn build_config(&self) -> Result<CheckConfig> {
        let mut config = match &self.config {
            Some(path) => CheckConfig::load(path)?,
            None => CheckConfig::default(),
        };
        config.apply_cli_overrides(self.overrides()?);
        Ok(config)
    }

    pub fn build_request(&self) -> CheckRequest {
        let state_dir = self
            .seekfile_directory
            .clone()
            .unwrap_or_else(default_state_dir);
        let mut request =
            CheckRequest::new(self.logfiles.clone(), state_dir).remove_stale(self.remove_seekfile);
        if let Some(tag) = &self.seekfile_tag {
            request = request.with_tag(tag);
        }
        if let Some(seekfile) = &self.seekfile {
            request = request.with_seek_file(seekfile);
        }
        request
    }

    fn overrides(&self) -> Result<CliOverrides> {
        Ok(CliOverrides {
            logformat: self.format.clone(),
            patterns: with_files(&self.patterns, &self.pattern_files)?,
            critical_patterns: with_files(&self.critical_patterns, &self.critical_pattern_files)?,
            negpatterns: with_files(&self.negpatterns, &self.negpattern_files)?,
            critical_negpatterns: with_files(
                &self.critical_negpatterns,
                &self.critical_negpattern_files,
            )?,
            case_insensitive: self.case_insensitive,
            encoding: self.encoding.clone(),
            warning: self.warning,
            critical: self.critical,
            nodiff_warn: self.nodiff_warn,
            nodiff_crit: self.nodiff_crit,
            trace_inode: self.trace_inode,
            multiline: self.multiline,
            scantime: self.scantime,
            expiration: self.expiration,
            cache: self.cache,
            cachetime: self.cachetime,
            lock_timeout: self.lock_timeout,
        })
    }
}

fn with_files(patterns: &[String], files: &[PathBuf]) -> Result<Vec<String>> {
    let mut all = patterns.to_vec();
    for file in files {
        all.extend(read_pattern_file(file)?);
    }
    Ok(all)
}

/// Per-user cache directory, or a directory under the system temp dir
pub fn default_state_dir() -> PathBuf {
    ProjectDirs::from("", "", "logsentry")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| env::temp_dir().join("logsentry"))
}

/// Install the stderr subscriber; `RUST_LOG` wins over `-v`
pub fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}
