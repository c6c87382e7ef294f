//! Check configuration
//!
//! Every option the check engine recognizes lives in [`CheckConfig`]. Values
//! come from built-in defaults, an optional TOML file, and finally command
//! line overrides.

use crate::error::{CheckError, CheckResult};
use crate::logformat::FORMAT_SYSLOG;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Record-start signature used in multiline mode
    pub logformat: String,
    pub pattern_list: Vec<String>,
    pub critical_pattern_list: Vec<String>,
    pub negpattern_list: Vec<String>,
    pub critical_negpattern_list: Vec<String>,
    pub case_insensitive: bool,
    /// Encoding label understood by the WHATWG encoding standard
    pub encoding: String,
    /// Warning match count threshold (0 means any match)
    pub warning: u32,
    /// Critical match count threshold (0 means any match)
    pub critical: u32,
    pub nodiff_warn: bool,
    pub nodiff_crit: bool,
    /// Follow files across renames by their platform file identity
    pub trace_inode: bool,
    pub multiline: bool,
    /// Files older than this many seconds are not scanned
    pub scantime: u64,
    /// Orphaned seek records older than this many seconds may be purged
    pub expiration: u64,
    pub cache: bool,
    pub cachetime: u64,
    pub lock_timeout: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            logformat: FORMAT_SYSLOG.to_string(),
            pattern_list: Vec::new(),
            critical_pattern_list: Vec::new(),
            negpattern_list: Vec::new(),
            critical_negpattern_list: Vec::new(),
            case_insensitive: false,
            encoding: "utf-8".to_string(),
            warning: 1,
            critical: 0,
            nodiff_warn: false,
            nodiff_crit: false,
            trace_inode: false,
            multiline: false,
            scantime: 86_400,
            expiration: 691_200,
            cache: false,
            cachetime: 60,
            lock_timeout: 3,
        }
    }
}

/// Command line values that take precedence over the config file
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub logformat: Option<String>,
    pub patterns: Vec<String>,
    pub critical_patterns: Vec<String>,
    pub negpatterns: Vec<String>,
    pub critical_negpatterns: Vec<String>,
    pub case_insensitive: bool,
    pub encoding: Option<String>,
    pub warning: Option<u32>,
    pub critical: Option<u32>,
    pub nodiff_warn: bool,
    pub nodiff_crit: bool,
    pub trace_inode: bool,
    pub multiline: bool,
    pub scantime: Option<u64>,
    pub expiration: Option<u64>,
    pub cache: bool,
    pub cachetime: Option<u64>,
    pub lock_timeout: Option<u64>,
}

impl CheckConfig {
    /// Load a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CheckConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Apply command line overrides. Pattern lists are appended, flags can only
    /// be switched on.
    pub fn apply_cli_overrides(&mut self, cli: CliOverrides) {
        if let Some(format) = cli.logformat {
            self.logformat = format;
        }
        self.pattern_list.extend(cli.patterns);
        self.critical_pattern_list.extend(cli.critical_patterns);
        self.negpattern_list.extend(cli.negpatterns);
        self.critical_negpattern_list.extend(cli.critical_negpatterns);
        self.case_insensitive |= cli.case_insensitive;
        if let Some(encoding) = cli.encoding {
            self.encoding = encoding;
        }
        if let Some(warning) = cli.warning {
            self.warning = warning;
        }
        if let Some(critical) = cli.critical {
            self.critical = critical;
        }
        self.nodiff_warn |= cli.nodiff_warn;
        self.nodiff_crit |= cli.nodiff_crit;
        self.trace_inode |= cli.trace_inode;
        self.multiline |= cli.multiline;
        if let Some(scantime) = cli.scantime {
            self.scantime = scantime;
        }
        if let Some(expiration) = cli.expiration {
            self.expiration = expiration;
        }
        self.cache |= cli.cache;
        if let Some(cachetime) = cli.cachetime {
            self.cachetime = cachetime;
        }
        if let Some(lock_timeout) = cli.lock_timeout {
            self.lock_timeout = lock_timeout;
        }
    }

    pub fn validate(&self) -> CheckResult<()> {
        if self.pattern_list.is_empty() && self.critical_pattern_list.is_empty() {
            return Err(CheckError::Config(
                "at least one pattern or critical pattern is required".to_string(),
            ));
        }
        if self.expiration < self.scantime {
            return Err(CheckError::Config(format!(
                "expiration ({}) must not be shorter than scantime ({})",
                self.expiration, self.scantime
            )));
        }
        if encoding_rs::Encoding::for_label(self.encoding.as_bytes()).is_none() {
            return Err(CheckError::UnknownEncoding(self.encoding.clone()));
        }
        Ok(())
    }

    pub fn scantime(&self) -> Duration {
        Duration::from_secs(self.scantime)
    }

    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration)
    }

    pub fn cachetime(&self) -> Duration {
        Duration::from_secs(self.cachetime)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout)
    }
}

/// Read a pattern file: one regex per line, blanks and `#` comments skipped
pub fn read_pattern_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pattern file: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CheckConfig::default();
        assert_eq!(config.warning, 1);
        assert_eq!(config.critical, 0);
        assert_eq!(config.scantime, 86_400);
        assert_eq!(config.expiration, 691_200);
        assert_eq!(config.cachetime, 60);
        assert_eq!(config.lock_timeout, 3);
        assert_eq!(config.encoding, "utf-8");
        assert!(!config.trace_inode);
    }

    #[test]
    fn test_validate_requires_pattern() {
        let config = CheckConfig::default();
        assert!(matches!(config.validate(), Err(CheckError::Config(_))));

        let config = CheckConfig {
            critical_pattern_list: vec!["FATAL".to_string()],
            ..CheckConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_expiration_and_encoding() {
        let config = CheckConfig {
            pattern_list: vec!["ERROR".to_string()],
            scantime: 10,
            expiration: 5,
            ..CheckConfig::default()
        };
        assert!(matches!(config.validate(), Err(CheckError::Config(_))));

        let config = CheckConfig {
            pattern_list: vec!["ERROR".to_string()],
            encoding: "no-such-encoding".to_string(),
            ..CheckConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CheckError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_load_toml_with_partial_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("check.toml");
        fs::write(
            &path,
            "pattern_list = [\"ERROR\"]\nwarning = 3\ntrace_inode = true\n",
        )
        .unwrap();

        let config = CheckConfig::load(&path).unwrap();
        assert_eq!(config.pattern_list, vec!["ERROR".to_string()]);
        assert_eq!(config.warning, 3);
        assert!(config.trace_inode);
        assert_eq!(config.critical, 0);
    }

    #[test]
    fn test_load_rejects_negative_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("check.toml");
        fs::write(&path, "warning = -1\n").unwrap();
        assert!(CheckConfig::load(&path).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = CheckConfig {
            pattern_list: vec!["ERROR".to_string()],
            ..CheckConfig::default()
        };
        config.apply_cli_overrides(CliOverrides {
            patterns: vec!["FAIL".to_string()],
            warning: Some(5),
            cache: true,
            lock_timeout: Some(10),
            ..CliOverrides::default()
        });

        assert_eq!(config.pattern_list, vec!["ERROR", "FAIL"]);
        assert_eq!(config.warning, 5);
        assert!(config.cache);
        assert_eq!(config.lock_timeout(), Duration::from_secs(10));
        assert_eq!(config.critical, 0);
    }

    #[test]
    fn test_read_pattern_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("patterns");
        fs::write(&path, "# comment\nERROR\n\n  \nFATAL.*disk\n").unwrap();

        let patterns = read_pattern_file(&path).unwrap();
        assert_eq!(patterns, vec!["ERROR", "FATAL.*disk"]);
    }
}
